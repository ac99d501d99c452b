//! Oracle response parsing.
//!
//! Responses are model-generated text and routinely arrive wrapped in code
//! fences, preceded by prose, or with missing fields. Everything here is
//! tolerant: unusable items are skipped rather than failing the response.

use serde_json::Value;

use crate::types::WordTimestamp;

use super::OracleSegment;

/// The text of the last part carrying text in a `generateContent` body.
///
/// Thinking models emit several parts; the answer is the last one.
pub fn response_text(body: &Value) -> Option<String> {
    body.get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .last()
        .map(str::to_string)
}

/// Locate the JSON array in free-form response text.
pub fn extract_json_array(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(v @ Value::Array(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(v);
    }

    let stripped = trimmed.replace("```json", "").replace("```", "");
    let stripped = stripped.trim();
    if let Ok(v @ Value::Array(_)) = serde_json::from_str::<Value>(stripped) {
        return Some(v);
    }

    let open = stripped.find('[')?;
    let close = stripped.rfind(']')?;
    if close <= open {
        return None;
    }
    match serde_json::from_str::<Value>(&stripped[open..=close]) {
        Ok(v @ Value::Array(_)) => Some(v),
        _ => None,
    }
}

fn as_number(v: &Value) -> Option<f64> {
    v.as_f64().filter(|x| x.is_finite())
}

fn parse_word(v: &Value) -> Option<WordTimestamp> {
    let word = v.get("word")?.as_str()?;
    let start = as_number(v.get("start")?)?;
    let end = as_number(v.get("end")?)?;
    Some(WordTimestamp::new(word, start, end))
}

fn parse_item(item: &Value) -> Option<OracleSegment> {
    let index = item.get("seg_index").or_else(|| item.get("segment"))?;
    let seg_index = usize::try_from(index.as_i64()?).ok()?;
    let repetitions = item
        .get("repetitions")
        .and_then(|r| r.as_i64().or_else(|| r.as_f64().map(|f| f.round() as i64)));
    let words = item
        .get("words")
        .and_then(Value::as_array)
        .map(|ws| ws.iter().filter_map(parse_word).collect())
        .unwrap_or_default();
    Some(OracleSegment {
        seg_index,
        repetitions,
        words,
    })
}

/// Parse response text into per-segment results.
///
/// Items referring to segments outside `0..segment_count` are dropped. When
/// an index appears twice, the first occurrence wins. Returns an error when
/// no array is found or no item is usable.
pub fn parse_response(text: &str, segment_count: usize) -> Result<Vec<OracleSegment>, String> {
    let array = extract_json_array(text).ok_or_else(|| {
        let preview: String = text.chars().take(200).collect();
        format!("no JSON array in response: {}", preview)
    })?;
    let items = array.as_array().map(Vec::as_slice).unwrap_or_default();

    let mut out: Vec<OracleSegment> = Vec::new();
    let mut skipped = 0usize;
    for item in items {
        match parse_item(item) {
            Some(seg) if seg.seg_index < segment_count => {
                if out.iter().any(|s| s.seg_index == seg.seg_index) {
                    skipped += 1;
                } else {
                    out.push(seg);
                }
            }
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        log::warn!("Skipped {} malformed or out-of-range oracle items", skipped);
    }
    if out.is_empty() {
        return Err("response contained no usable segments".to_string());
    }
    out.sort_by_key(|s| s.seg_index);
    Ok(out)
}
