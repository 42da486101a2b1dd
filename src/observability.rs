//! Structured event lines for the exchange layer.
//!
//! Virtual files and containers are engine-side registrations that outlive a
//! single call, so their creation and release are logged as key/value events.
//! Grepping for `GMT_EXCHANGE_EVENT` reconstructs which names were live when a
//! failure happened.

/// Logs a structured key-value event at debug level.
///
/// # Example
/// ```
/// use gmt_exchange::log_event;
/// let name = "@GMTAPI@-000001";
/// log_event!("event" = "virtualfile_open", "name" = name);
/// ```
#[macro_export]
macro_rules! log_event {
    ($($key:literal = $value:expr),+ $(,)?) => {
        if log::log_enabled!(log::Level::Debug) {
            let mut parts = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+
            log::debug!("GMT_EXCHANGE_EVENT: {{ {} }}", parts.join(", "));
        }
    };
}
