// Chordpipe Pipeline Engine
// Sequential composition of stages over one lazy, unbounded event stream

use std::collections::VecDeque;

use super::Event;

/// A single transformation step.
///
/// A stage sees each upstream event exactly once, in order, and pushes
/// whatever it wants to emit onto `out`. Anything it does not explicitly
/// drop or rewrite must be pushed unchanged.
pub trait Stage {
    /// Short name used in log output
    fn name(&self) -> &'static str;

    /// Called once before the first upstream event is pulled
    fn start(&mut self, _out: &mut VecDeque<Event>) {}

    /// Handle one upstream event
    fn process(&mut self, event: Event, out: &mut VecDeque<Event>);
}

impl<S: Stage + ?Sized> Stage for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn start(&mut self, out: &mut VecDeque<Event>) {
        (**self).start(out)
    }

    fn process(&mut self, event: Event, out: &mut VecDeque<Event>) {
        (**self).process(event, out)
    }
}

impl<S: Stage + ?Sized> Stage for &mut S {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn start(&mut self, out: &mut VecDeque<Event>) {
        (**self).start(out)
    }

    fn process(&mut self, event: Event, out: &mut VecDeque<Event>) {
        (**self).process(event, out)
    }
}

/// A stage built from a closure
pub struct FnStage<F> {
    name: &'static str,
    f: F,
}

impl<F> FnStage<F>
where
    F: FnMut(Event, &mut VecDeque<Event>),
{
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<F> Stage for FnStage<F>
where
    F: FnMut(Event, &mut VecDeque<Event>),
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn process(&mut self, event: Event, out: &mut VecDeque<Event>) {
        (self.f)(event, out)
    }
}

/// Iterator adapter running one stage over an upstream iterator.
///
/// Upstream is only pulled when everything the stage emitted so far has been
/// consumed, so a stage never runs ahead of its consumer.
pub struct Staged<I, S> {
    upstream: I,
    stage: S,
    pending: VecDeque<Event>,
    started: bool,
    exhausted: bool,
}

impl<I, S> Staged<I, S> {
    pub fn new(upstream: I, stage: S) -> Self {
        Self {
            upstream,
            stage,
            pending: VecDeque::new(),
            started: false,
            exhausted: false,
        }
    }
}

impl<I, S> Iterator for Staged<I, S>
where
    I: Iterator<Item = Event>,
    S: Stage,
{
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        if !self.started {
            self.started = true;
            self.stage.start(&mut self.pending);
        }
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if self.exhausted {
                return None;
            }
            match self.upstream.next() {
                Some(event) => {
                    log::trace!("{} <- {}", self.stage.name(), event);
                    self.stage.process(event, &mut self.pending);
                }
                None => self.exhausted = true,
            }
        }
    }
}

type EventStream<'a> = Box<dyn Iterator<Item = Event> + 'a>;

/// An ordered chain of stages over a source.
///
/// ```
/// use chordpipe_core::event::{Event, Pipeline};
/// use chordpipe_core::transform::ChordDetector;
///
/// let source = vec![
///     Event::key_down("physkey", "A"),
///     Event::key_up("physkey", "A"),
///     Event::exit(),
/// ];
/// let out: Vec<Event> = Pipeline::new(source.into_iter())
///     .stage(ChordDetector::new("physkey"))
///     .collect();
/// assert!(out.iter().any(|e| e.chord_keys().is_some()));
/// ```
pub struct Pipeline<'a> {
    stream: EventStream<'a>,
}

impl<'a> Pipeline<'a> {
    pub fn new(source: impl Iterator<Item = Event> + 'a) -> Self {
        Self {
            stream: Box::new(source),
        }
    }

    /// Append one stage
    pub fn stage<S: Stage + 'a>(self, stage: S) -> Self {
        Self {
            stream: Box::new(Staged::new(self.stream, stage)),
        }
    }

    /// Append a list of stages, first element closest to the source
    pub fn stages(self, stages: Vec<Box<dyn Stage + 'a>>) -> Self {
        stages.into_iter().fold(self, |pipeline, stage| pipeline.stage(stage))
    }
}

impl Iterator for Pipeline<'_> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        self.stream.next()
    }
}
