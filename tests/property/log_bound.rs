use std::sync::Arc;

use proptest::prelude::*;
use mirrorctl::settings::{keys, MemoryStore, SettingsStore};
use mirrorctl::sink::LogSink;
use mirrorctl::types::StreamSource;

fn sink_with_max(max: i64) -> LogSink {
    let store = Arc::new(MemoryStore::new());
    store.set(keys::MAX_LOG_LINES, max.into()).unwrap();
    LogSink::new(store)
}

proptest! {
    #[test]
    fn log_never_exceeds_bound_and_keeps_newest_lines(
        max in -2i64..12,
        lines in proptest::collection::vec(("[a-z]{1,8}", any::<bool>()), 0..40),
    ) {
        let sink = sink_with_max(max);

        for (text, is_stderr) in &lines {
            let source = if *is_stderr { StreamSource::Stderr } else { StreamSource::Stdout };
            sink.append(text.clone(), source);
            if max > 0 {
                prop_assert!(sink.len() as i64 <= max);
            }
        }

        // Whatever survives is a suffix of the input, in order.
        let keep = if max > 0 { lines.len().min(max as usize) } else { lines.len() };
        let expected: Vec<&str> = lines[lines.len() - keep..]
            .iter()
            .map(|(text, _)| text.as_str())
            .collect();
        let entries = sink.snapshot();
        let actual: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
        prop_assert_eq!(actual, expected);
    }
}
