use dioxus::prelude::*;

use services::{EngineStore, SessionEngine};

/// Session engine held in a signal, so every transition re-renders readers.
#[derive(Clone, Copy, PartialEq)]
pub struct EngineSignal(Signal<SessionEngine>);

impl EngineSignal {
    #[must_use]
    pub fn new(signal: Signal<SessionEngine>) -> Self {
        Self(signal)
    }

    #[must_use]
    pub fn signal(self) -> Signal<SessionEngine> {
        self.0
    }
}

impl EngineStore for EngineSignal {
    fn with_engine<R>(&self, f: impl FnOnce(&mut SessionEngine) -> R) -> R {
        let mut signal = self.0;
        let mut engine = signal.write();
        f(&mut engine)
    }
}
