use super::PageParser;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

impl PageParser {
    /// JSON-LD objects from `<script type="application/ld+json">`, with
    /// top-level arrays and `@graph` containers flattened. Scripts that do not
    /// parse are skipped.
    pub(super) fn extract_existing_schemas(&self, document: &Html) -> Vec<Value> {
        let mut out = Vec::new();
        let Ok(selector) = Selector::parse("script[type='application/ld+json']") else {
            return out;
        };

        for script in document.select(&selector) {
            let json_text = script.inner_html();
            if json_text.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<Value>(json_text.trim()) {
                Ok(value) => collect_json_ld(value, &mut out),
                Err(e) => debug!("skipping malformed JSON-LD block: {}", e),
            }
        }

        out
    }
}

fn collect_json_ld(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_json_ld(item, out);
            }
        }
        Value::Object(mut map) => {
            if let Some(graph) = map.remove("@graph") {
                collect_json_ld(graph, out);
            }
            if map.contains_key("@type") {
                out.push(Value::Object(map));
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_and_arrays_are_flattened() {
        let html = r#"<head>
            <script type="application/ld+json">
              {"@context":"https://schema.org","@graph":[{"@type":"WebSite","name":"S"},{"@type":"Organization","name":"O"}]}
            </script>
            <script type="application/ld+json">[{"@type":"Product","name":"P"}]</script>
            <script type="application/ld+json">{ not json </script>
        </head>"#;
        let document = Html::parse_document(html);
        let schemas = PageParser::new().extract_existing_schemas(&document);

        let types: Vec<&str> = schemas
            .iter()
            .filter_map(|s| s.get("@type").and_then(|t| t.as_str()))
            .collect();
        assert_eq!(types, vec!["WebSite", "Organization", "Product"]);
    }
}
