use biometrics::{Collector, Counter, Moments};

pub(crate) static SESSION_CYCLES: Counter = Counter::new("palaver.session.cycles");
pub(crate) static SESSION_CYCLE_FAILURES: Counter = Counter::new("palaver.session.cycle_failures");
pub(crate) static SESSION_TIMEOUTS: Counter = Counter::new("palaver.session.timeouts");
pub(crate) static SESSION_TTFR: Moments =
    Moments::new("palaver.session.time_to_first_response_seconds");

pub(crate) static STREAM_FRAGMENTS: Counter = Counter::new("palaver.stream.fragments");
pub(crate) static STREAM_MALFORMED: Counter = Counter::new("palaver.stream.malformed_fragments");
pub(crate) static EMPTY_RESPONSES: Counter = Counter::new("palaver.stream.empty_responses");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&SESSION_CYCLES);
    collector.register_counter(&SESSION_CYCLE_FAILURES);
    collector.register_counter(&SESSION_TIMEOUTS);
    collector.register_moments(&SESSION_TTFR);

    collector.register_counter(&STREAM_FRAGMENTS);
    collector.register_counter(&STREAM_MALFORMED);
    collector.register_counter(&EMPTY_RESPONSES);
}
