//! Stage instrumentation for the proposal and detection pipelines.
//!
//! Both macros take a literal stage name followed by `key = value` fields.
//! Without the `tracing` feature the field expressions are still evaluated
//! and nothing is recorded.

#[cfg(feature = "tracing")]
macro_rules! stage_span {
    ($name:literal $(, $key:ident = $value:expr)+ $(,)?) => {
        tracing::span!(tracing::Level::INFO, $name, $($key = $value),+)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! stage_span {
    ($name:literal $(, $key:ident = $value:expr)+ $(,)?) => {{
        $(let _ = &$value;)+
        $crate::trace::Silent
    }};
}

/// Records stage counters as a single info event.
#[cfg(feature = "tracing")]
macro_rules! stage_event {
    ($name:literal $(, $key:ident = $value:expr)+ $(,)?) => {
        tracing::event!(name: $name, tracing::Level::INFO, $($key = $value),+)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! stage_event {
    ($name:literal $(, $key:ident = $value:expr)+ $(,)?) => {{
        $(let _ = &$value;)+
    }};
}

pub(crate) use stage_event;
pub(crate) use stage_span;

/// Span guard for builds that record nothing.
#[cfg(not(feature = "tracing"))]
pub(crate) struct Silent;

#[cfg(not(feature = "tracing"))]
impl Silent {
    #[inline]
    pub(crate) fn entered(self) -> Self {
        self
    }
}
