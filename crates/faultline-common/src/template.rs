//! Annotation template rendering.
//!
//! Rule annotations may reference probe measurement labels with `${name}`
//! placeholders; unknown names render as `-`.

use crate::types::Labels;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\$\{\s*([A-Za-z0-9_.]+)\s*\}").expect("static regex"));

/// Substitute `${label}` placeholders in `template` from `labels`.
pub fn render(template: &str, labels: &Labels) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            match labels.get(&caps[1]) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => "-".to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn substitutes_known_labels() {
        let mut labels = Labels::new();
        labels.insert("address".into(), json!("10.0.0.1"));
        labels.insert("PacketLoss".into(), json!(12.5));
        let out = render("endpoint ${address} loss ${PacketLoss}%", &labels);
        assert_eq!(out, "endpoint 10.0.0.1 loss 12.5%");
    }

    #[test]
    fn unknown_label_renders_dash() {
        let out = render("value=${missing}", &Labels::new());
        assert_eq!(out, "value=-");
    }
}
