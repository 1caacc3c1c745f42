//! Choice tokens: an intent name plus ordered parameters packed into one string.
//!
//! Grammar: `<intent>(&<key>=<value>)*`. The reserved characters `%`, `&` and `=`
//! are written as `%25`, `%26` and `%3D` wherever they occur in the intent, a
//! key or a value; no other escape sequence is valid. Control characters are
//! never allowed. Token length is measured in bytes.

use crate::error::{Error, Result};
use serde::ser::{Serialize, SerializeMap, Serializer};

const DELIM: char = '&';
const KV_SEP: char = '=';
const ESCAPE: char = '%';

/// Insertion-ordered string map carried by a choice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters(Vec<(String, String)>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => Some(std::mem::replace(v, value)),
            None => {
                self.0.push((key, value));
                None
            }
        }
    }

    /// Insert only when `key` is absent. Returns whether the value was stored.
    pub fn insert_if_absent(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if self.contains_key(&key) {
            return false;
        }
        self.0.push((key, value.into()));
        true
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Parameters::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

impl Serialize for Parameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

fn is_reserved(c: char) -> bool {
    c == DELIM || c == KV_SEP || c == ESCAPE
}

fn escaped_len(s: &str) -> usize {
    s.chars()
        .map(|c| if is_reserved(c) { 3 } else { c.len_utf8() })
        .sum()
}

fn push_escaped(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            ESCAPE => out.push_str("%25"),
            DELIM => out.push_str("%26"),
            KV_SEP => out.push_str("%3D"),
            c => out.push(c),
        }
    }
}

fn check_encodable(what: &str, s: &str, allow_empty: bool) -> Result<()> {
    if !allow_empty && s.is_empty() {
        return Err(Error::Encoding(format!("{} is empty", what)));
    }
    if let Some(c) = s.chars().find(|c| c.is_control()) {
        return Err(Error::Encoding(format!(
            "{} contains control character {:?}",
            what, c
        )));
    }
    Ok(())
}

/// Exact byte length of `encode(intent, params)`, computed without building it.
pub fn encoded_len(intent: &str, params: &Parameters) -> usize {
    escaped_len(intent)
        + params
            .iter()
            .map(|(k, v)| 2 + escaped_len(k) + escaped_len(v))
            .sum::<usize>()
}

/// Encode an intent and its parameters. Same inputs in the same order give the same token.
pub fn encode(intent: &str, params: &Parameters) -> Result<String> {
    check_encodable("intent name", intent, false)?;
    for (k, v) in params.iter() {
        check_encodable("parameter key", k, false)?;
        check_encodable(&format!("value of parameter {:?}", k), v, true)?;
    }
    let mut token = String::with_capacity(encoded_len(intent, params));
    push_escaped(&mut token, intent);
    for (k, v) in params.iter() {
        token.push(DELIM);
        push_escaped(&mut token, k);
        token.push(KV_SEP);
        push_escaped(&mut token, v);
    }
    Ok(token)
}

/// Encode, rejecting with [`Error::TokenTooLong`] before allocating when `max_len` would be exceeded.
pub fn encode_bounded(intent: &str, params: &Parameters, max_len: Option<usize>) -> Result<String> {
    if let Some(max) = max_len {
        let len = encoded_len(intent, params);
        if len > max {
            return Err(Error::TokenTooLong { len, max });
        }
    }
    encode(intent, params)
}

fn unescape(segment: &str) -> Result<String> {
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
        match c {
            ESCAPE => {
                let code: String = chars.by_ref().take(2).collect();
                match code.as_str() {
                    "25" => out.push(ESCAPE),
                    "26" => out.push(DELIM),
                    "3D" => out.push(KV_SEP),
                    _ => {
                        return Err(Error::Decoding(format!(
                            "invalid escape sequence %{}",
                            code
                        )))
                    }
                }
            }
            KV_SEP => return Err(Error::Decoding("unescaped '='".to_string())),
            c if c.is_control() => {
                return Err(Error::Decoding(format!("control character {:?}", c)))
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

/// Decode a token back to its intent name and parameters.
pub fn decode(token: &str) -> Result<(String, Parameters)> {
    let mut segments = token.split(DELIM);
    let intent = unescape(segments.next().unwrap_or_default())?;
    if intent.is_empty() {
        return Err(Error::Decoding("empty intent name".to_string()));
    }
    let mut params = Parameters::new();
    for pair in segments {
        let (key, value) = pair
            .split_once(KV_SEP)
            .ok_or_else(|| Error::Decoding(format!("parameter {:?} has no '='", pair)))?;
        let key = unescape(key)?;
        let value = unescape(value)?;
        if key.is_empty() {
            return Err(Error::Decoding("empty parameter key".to_string()));
        }
        if !params.insert_if_absent(key.clone(), value) {
            return Err(Error::Decoding(format!("duplicate parameter {:?}", key)));
        }
    }
    Ok((intent, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Parameters {
        pairs.iter().copied().collect()
    }

    #[test]
    fn intent_only_token_is_the_intent() {
        assert_eq!(encode("greet", &Parameters::new()).unwrap(), "greet");
        assert_eq!(decode("greet").unwrap(), ("greet".to_string(), Parameters::new()));
    }

    #[test]
    fn parameters_keep_insertion_order() {
        let p = params(&[("to", "Lyon"), ("from", "Paris")]);
        let token = encode("book_trip", &p).unwrap();
        assert_eq!(token, "book_trip&to=Lyon&from=Paris");
        let (_, decoded) = decode(&token).unwrap();
        let keys: Vec<_> = decoded.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["to", "from"]);
    }

    #[test]
    fn reserved_characters_round_trip() {
        let p = params(&[("q=1", "a&b%c"), ("empty", ""), ("unicode", "café ☕")]);
        let token = encode("search%intent", &p).unwrap();
        assert_eq!(
            token,
            "search%25intent&q%3D1=a%26b%25c&empty=&unicode=café ☕"
        );
        assert_eq!(decode(&token).unwrap(), ("search%intent".to_string(), p));
    }

    #[test]
    fn encoding_is_deterministic() {
        let p = params(&[("a", "1"), ("b", "2")]);
        assert_eq!(encode("x", &p).unwrap(), encode("x", &p).unwrap());
    }

    #[test]
    fn length_matches_encoded_token() {
        let cases = [
            ("greet", params(&[])),
            ("a&b", params(&[("k", "v=w"), ("%", "")])),
            ("naïve", params(&[("ключ", "значение")])),
        ];
        for (intent, p) in &cases {
            assert_eq!(encoded_len(intent, p), encode(intent, p).unwrap().len());
        }
    }

    #[test]
    fn every_short_combination_round_trips() {
        let alphabet = ['%', '&', '=', '2', '5', '3', 'D', 'é', 'a'];
        let strings: Vec<String> = alphabet
            .iter()
            .flat_map(|a| alphabet.iter().map(move |b| format!("{}{}", a, b)))
            .collect();
        for intent in &strings {
            for key in &strings {
                for value in &strings {
                    let p = params(&[(key.as_str(), value.as_str())]);
                    let token = encode(intent, &p).unwrap();
                    assert_eq!(token.len(), encoded_len(intent, &p));
                    assert_eq!(decode(&token).unwrap(), (intent.clone(), p));
                }
            }
        }
    }

    #[test]
    fn encode_rejects_control_characters_and_empty_names() {
        assert!(matches!(encode("", &Parameters::new()), Err(Error::Encoding(_))));
        assert!(matches!(encode("a\nb", &Parameters::new()), Err(Error::Encoding(_))));
        assert!(matches!(encode("a", &params(&[("", "v")])), Err(Error::Encoding(_))));
        assert!(matches!(encode("a", &params(&[("k", "\u{7}")])), Err(Error::Encoding(_))));
    }

    #[test]
    fn bounded_encode_checks_length_first() {
        let p = params(&[("city", "Paris")]);
        let len = encoded_len("go", &p);
        assert!(encode_bounded("go", &p, Some(len)).is_ok());
        assert_eq!(
            encode_bounded("go", &p, Some(len - 1)),
            Err(Error::TokenTooLong { len, max: len - 1 })
        );
        assert!(encode_bounded("go", &p, None).is_ok());
    }

    #[test]
    fn decode_rejects_grammar_violations() {
        for bad in ["", "&k=v", "a&k", "a&k=v=w", "a&=v", "a%2", "a%41", "a=b", "a&k=v&k=w"] {
            assert!(
                matches!(decode(bad), Err(Error::Decoding(_))),
                "expected decoding error for {:?}",
                bad
            );
        }
    }
}
