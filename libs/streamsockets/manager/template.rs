//! Channel template expansion: `"<symbol>@kline_<interval>"` with
//! `symbol=BTCUSDT, interval=1m` becomes `"btcusdt@kline_1m"`.

use crate::traits::{Result, StreamError};

/// Substitute every `<key>` with the lower-cased value. Leftover
/// placeholders are an error.
pub fn expand_template(template: &str, params: &[(&str, &str)]) -> Result<String> {
    let mut channel = template.to_string();
    for (key, value) in params {
        channel = channel.replace(&format!("<{}>", key), &value.to_lowercase());
    }

    if let Some(start) = channel.find('<') {
        if channel[start..].contains('>') {
            return Err(StreamError::InvalidTemplate(format!(
                "unresolved placeholder in {}",
                channel
            )));
        }
    }
    if channel.is_empty() {
        return Err(StreamError::InvalidTemplate("empty channel".to_string()));
    }
    Ok(channel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expands_and_lowercases() {
        let channel = expand_template(
            "<symbol>@kline_<interval>",
            &[("symbol", "BTCUSDT"), ("interval", "1m")],
        )
        .unwrap();
        assert_eq!(channel, "btcusdt@kline_1m");
    }

    #[test]
    fn test_plain_channel_passes_through() {
        assert_eq!(expand_template("!markPrice@arr", &[]).unwrap(), "!markPrice@arr");
    }

    #[test]
    fn test_missing_param_is_an_error() {
        let err = expand_template("<symbol>@kline_<interval>", &[("symbol", "ETHUSDT")]);
        assert!(matches!(err, Err(StreamError::InvalidTemplate(_))));
    }
}
