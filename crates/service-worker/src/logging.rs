use std::sync::Once;

use time::format_description::well_known::Iso8601;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{format::Pretty, time::UtcTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    Layer,
};
use tracing_web::{performance_layer, MakeWebConsoleWriter};

pub fn configure_tracing(debug: bool) {
    let level = if debug { LevelFilter::DEBUG } else { LevelFilter::INFO };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false) // Only partially supported across browsers
        .with_timer(UtcTime::new(Iso8601::DEFAULT))
        .with_writer(MakeWebConsoleWriter::new()) // write events to the console
        .with_filter(level);
    let perf_layer = performance_layer().with_details_from_fields(Pretty::default());

    // Install these as subscribers to tracing events
    tracing_subscriber::registry().with(fmt_layer).with(perf_layer).init();
}

/// Configures tracing inside a Once block so multiple calls don't panic. Only
/// the first caller's `debug` flag counts
pub fn configure_tracing_once(debug: bool) {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| configure_tracing(debug));
}
