//! Ranking of per-vehicle completion times returned by the server.
//!
//! The server answers `GET /api/get_times` with either a flat object
//! (`{"car1": "3.5s", "car2": "DNF"}`) or a single `finish` key whose value is a
//! text blob of `id: token` pairs (`{"finish": "car1: 2.0s, car2: 5.1s"}`).
//! Both shapes become a [`TimingSheet`]; [`order_results`] turns a sheet into
//! [`Standings`].

use crate::core::{FinishTime, RankedEntry, Standings, TimingEntry};
use crate::utils::error::{GuideError, Result};
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::OnceLock;

/// Key of the nested blob form.
pub const FINISH_KEY: &str = "finish";

/// Label shown instead of a time for vehicles whose token does not parse.
pub const NOT_FINISHED_LABEL: &str = "has not finished";

/// `"?ident"? : value` where ident is word characters and value runs up to the
/// next comma or brace.
const TOKEN_PAIR_PATTERN: &str = r#""?(\w+)"?\s*:\s*([^,{}]+)"#;

fn token_pair_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(TOKEN_PAIR_PATTERN).expect("token pair pattern is valid"))
}

/// Parses `"<number>s"` or `"<number>"`. Anything else, including non-finite
/// numbers, is unfinished.
pub fn parse_time_token(token: &str) -> FinishTime {
    let trimmed = token.trim();
    let number = trimmed.strip_suffix('s').unwrap_or(trimmed).trim_end();

    match number.parse::<f64>() {
        Ok(seconds) if seconds.is_finite() => FinishTime::Finished(seconds),
        _ => FinishTime::Unfinished,
    }
}

/// Finished times ascending, every finished time before any unfinished one.
pub fn compare_finish_times(a: &FinishTime, b: &FinishTime) -> Ordering {
    match (a, b) {
        (FinishTime::Finished(x), FinishTime::Finished(y)) => {
            x.partial_cmp(y).unwrap_or(Ordering::Equal)
        }
        (FinishTime::Finished(_), FinishTime::Unfinished) => Ordering::Less,
        (FinishTime::Unfinished, FinishTime::Finished(_)) => Ordering::Greater,
        (FinishTime::Unfinished, FinishTime::Unfinished) => Ordering::Equal,
    }
}

/// Extracts `id: token` pairs from the nested blob. Braces are ignored, pairs
/// are comma separated, quotes around ids and tokens are dropped.
pub fn parse_finish_blob(blob: &str) -> Vec<TimingEntry> {
    token_pair_regex()
        .captures_iter(blob)
        .filter_map(|caps| {
            let id = caps.get(1)?.as_str();
            let token = caps.get(2)?.as_str().trim().trim_matches('"').trim();
            Some(TimingEntry::new(id, token))
        })
        .collect()
}

/// Timing entries in the order the server sent them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimingSheet {
    entries: Vec<TimingEntry>,
}

impl TimingSheet {
    pub fn new(entries: Vec<TimingEntry>) -> Self {
        Self { entries }
    }

    pub fn from_json_str(body: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(body)?;
        Self::from_json(&value)
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(GuideError::ResponseFormatError {
                message: format!("expected a JSON object of times, got {}", json_kind(value)),
            });
        };

        if map.len() == 1 {
            if let Some(Value::String(blob)) = map.get(FINISH_KEY) {
                let entries = parse_finish_blob(blob);
                if !entries.is_empty() {
                    tracing::debug!("Parsed {} entries from finish blob", entries.len());
                    return Ok(Self { entries });
                }
                tracing::warn!("Finish blob contained no id:time pairs: {:?}", blob);
            }
        }

        let entries = map
            .iter()
            .map(|(id, raw)| TimingEntry::new(id.clone(), token_text(raw)))
            .collect();

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[TimingEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<TimingEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn standings(&self) -> Standings {
        order_results(&self.entries)
    }
}

// Non-string tokens degrade instead of failing the whole response.
fn token_text(raw: &Value) -> String {
    match raw {
        Value::String(token) => token.clone(),
        Value::Number(number) => number.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Stable ranking: finished entries ascending by time, then unfinished entries in
/// input order. Ranks start at 1.
pub fn order_results(entries: &[TimingEntry]) -> Standings {
    let mut keyed: Vec<(FinishTime, &TimingEntry)> = entries
        .iter()
        .map(|entry| (parse_time_token(&entry.token), entry))
        .collect();

    // sort_by is stable, which keeps ties and unfinished entries in input order
    keyed.sort_by(|(a, _), (b, _)| compare_finish_times(a, b));

    let entries = keyed
        .into_iter()
        .enumerate()
        .map(|(index, (time, entry))| RankedEntry {
            rank: index + 1,
            id: entry.id.clone(),
            token: entry.token.clone(),
            label: if time.is_finished() {
                entry.token.clone()
            } else {
                NOT_FINISHED_LABEL.to_string()
            },
        })
        .collect();

    Standings { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(standings: &Standings) -> Vec<&str> {
        standings.iter().map(|e| e.id.as_str()).collect()
    }

    fn entries(pairs: &[(&str, &str)]) -> Vec<TimingEntry> {
        pairs
            .iter()
            .map(|(id, token)| TimingEntry::new(*id, *token))
            .collect()
    }

    #[test]
    fn test_parse_time_token() {
        assert_eq!(parse_time_token("3.5s"), FinishTime::Finished(3.5));
        assert_eq!(parse_time_token("2"), FinishTime::Finished(2.0));
        assert_eq!(parse_time_token(" 4.25s "), FinishTime::Finished(4.25));
        assert_eq!(parse_time_token("0s"), FinishTime::Finished(0.0));
        assert_eq!(parse_time_token("DNF"), FinishTime::Unfinished);
        assert_eq!(parse_time_token(""), FinishTime::Unfinished);
        assert_eq!(parse_time_token("s"), FinishTime::Unfinished);
        assert_eq!(parse_time_token("3.5ss"), FinishTime::Unfinished);
        assert_eq!(parse_time_token("inf"), FinishTime::Unfinished);
        assert_eq!(parse_time_token("NaN"), FinishTime::Unfinished);
        assert_eq!(parse_time_token("1.5ms"), FinishTime::Unfinished);
    }

    #[test]
    fn test_finished_entries_sorted_ascending() {
        let standings = order_results(&entries(&[("car1", "3.5s"), ("car2", "2.1s")]));

        assert_eq!(ids(&standings), vec!["car2", "car1"]);
        assert_eq!(standings.entries[0].rank, 1);
        assert_eq!(standings.entries[0].label, "2.1s");
        assert_eq!(standings.entries[1].rank, 2);
        assert_eq!(standings.entries[1].label, "3.5s");
    }

    #[test]
    fn test_unfinished_entries_follow_finished() {
        let standings = order_results(&entries(&[("car1", "3.5s"), ("car2", "DNF")]));

        assert_eq!(ids(&standings), vec!["car1", "car2"]);
        assert_eq!(standings.entries[1].label, NOT_FINISHED_LABEL);
        assert_eq!(standings.entries[1].token, "DNF");
        assert_eq!(standings.entries[1].rank, 2);
    }

    #[test]
    fn test_empty_input_yields_empty_standings() {
        let standings = order_results(&[]);
        assert!(standings.is_empty());
    }

    #[test]
    fn test_ordering_is_stable() {
        let input = entries(&[
            ("a", "x"),
            ("b", "5s"),
            ("c", "2"),
            ("d", "5.0s"),
            ("e", "y"),
            ("f", "2s"),
        ]);
        let standings = order_results(&input);

        assert_eq!(ids(&standings), vec!["c", "f", "b", "d", "a", "e"]);
    }

    #[test]
    fn test_ordering_is_idempotent() {
        let input = entries(&[
            ("car3", "pending"),
            ("car1", "9.9s"),
            ("car4", "1.0"),
            ("car2", "9.9"),
        ]);
        let once = order_results(&input);
        let twice = order_results(&once.timing_entries());

        assert_eq!(once, twice);
    }

    #[test]
    fn test_ordering_invariants_hold_for_mixed_inputs() {
        let tokens = ["1s", "DNF", "0.5", "", "7s", "abc", "3.25s", "-1", "1s", "nan"];
        // rotate the token list to get a handful of different inputs
        for shift in 0..tokens.len() {
            let input: Vec<TimingEntry> = (0..tokens.len())
                .map(|i| TimingEntry::new(format!("car{}", i), tokens[(i + shift) % tokens.len()]))
                .collect();
            let standings = order_results(&input);
            assert_eq!(standings.len(), input.len());

            let times: Vec<FinishTime> = standings
                .iter()
                .map(|e| parse_time_token(&e.token))
                .collect();
            let first_unfinished = times.iter().position(|t| !t.is_finished());
            if let Some(split) = first_unfinished {
                assert!(times[split..].iter().all(|t| !t.is_finished()));
            }
            let finished: Vec<f64> = times.iter().filter_map(|t| t.seconds()).collect();
            assert!(finished.windows(2).all(|w| w[0] <= w[1]));

            let ranks: Vec<usize> = standings.iter().map(|e| e.rank).collect();
            assert_eq!(ranks, (1..=input.len()).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_order_results_does_not_mutate_input() {
        let input = entries(&[("car1", "3.5s"), ("car2", "2.1s")]);
        let before = input.clone();
        let _ = order_results(&input);
        assert_eq!(input, before);
    }

    #[test]
    fn test_sheet_from_flat_object_keeps_server_order() {
        let sheet = TimingSheet::from_json(&json!({"car9": "4s", "car1": "DNF", "car5": "2s"}))
            .unwrap();

        let ids: Vec<&str> = sheet.entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["car9", "car1", "car5"]);
    }

    #[test]
    fn test_sheet_from_finish_blob() {
        let sheet = TimingSheet::from_json(&json!({"finish": "car1: 2.0s, car2: 5.1s"})).unwrap();

        assert_eq!(
            sheet.entries(),
            &[TimingEntry::new("car1", "2.0s"), TimingEntry::new("car2", "5.1s")]
        );
        let standings = sheet.standings();
        assert_eq!(ids(&standings), vec!["car1", "car2"]);
        assert_eq!(standings.entries[0].label, "2.0s");
    }

    #[test]
    fn test_finish_blob_with_braces_and_quotes() {
        let entries = parse_finish_blob(r#"{"car_2": "7.5s", car1:3s,car3 : DNF}"#);

        assert_eq!(
            entries,
            vec![
                TimingEntry::new("car_2", "7.5s"),
                TimingEntry::new("car1", "3s"),
                TimingEntry::new("car3", "DNF"),
            ]
        );
    }

    #[test]
    fn test_finish_blob_tolerates_garbage() {
        let inputs = [
            "",
            ":",
            ",,,,",
            "{}",
            "{{:}}",
            "car1:",
            ": 3s",
            "car1 3s",
            "\u{0}\u{1}:\u{2}",
            "ñandú: 1s",
            "a:b:c:d",
        ];
        for input in inputs {
            for entry in parse_finish_blob(input) {
                assert!(!entry.id.is_empty());
                assert!(!entry.token.contains(','));
            }
        }
        assert_eq!(parse_finish_blob("a:b:c"), vec![TimingEntry::new("a", "b:c")]);
    }

    #[test]
    fn test_finish_key_without_pairs_is_treated_as_flat() {
        let sheet = TimingSheet::from_json(&json!({"finish": "12.5s"})).unwrap();
        assert_eq!(sheet.entries(), &[TimingEntry::new("finish", "12.5s")]);
    }

    #[test]
    fn test_finish_key_among_others_is_a_vehicle() {
        let sheet =
            TimingSheet::from_json(&json!({"finish": "car1: 1s", "car2": "2s"})).unwrap();
        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet.entries()[0].id, "finish");
    }

    #[test]
    fn test_non_string_tokens_degrade() {
        let sheet = TimingSheet::from_json(&json!({
            "car1": 4.5,
            "car2": null,
            "car3": {"lap": 1},
            "car4": "1s"
        }))
        .unwrap();
        let standings = sheet.standings();

        assert_eq!(ids(&standings), vec!["car4", "car1", "car2", "car3"]);
        assert_eq!(standings.entries[1].label, "4.5");
        assert_eq!(standings.entries[2].label, NOT_FINISHED_LABEL);
        assert_eq!(standings.entries[3].label, NOT_FINISHED_LABEL);
    }

    #[test]
    fn test_non_object_response_is_an_error() {
        let err = TimingSheet::from_json(&json!(["car1", "2s"])).unwrap_err();
        assert!(matches!(err, GuideError::ResponseFormatError { .. }));

        assert!(TimingSheet::from_json_str("not json").is_err());
        assert!(TimingSheet::from_json_str("{}").unwrap().is_empty());
    }
}
