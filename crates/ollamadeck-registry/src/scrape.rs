//! Markup extraction for registry pages.
//!
//! The registry is scraped, not queried: these functions locate
//! structural markers in the page text and pull records out from around
//! them. The markup is third-party and shifts over time, so extraction is
//! best-effort — a block that doesn't yield a usable record is skipped,
//! and a page that matches nothing produces an empty list rather than an
//! error. Keeping these as pure `&str -> records` functions lets them be
//! tested against frozen page snippets without any network access.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use ollamadeck_core::{ModelTag, RemoteModel};

/// Marker preceding each model family on the index page.
const INDEX_BLOCK_MARKER: &str = "<a href=\"/library/";

/// Marker preceding each tag value on a family's tag page.
const TAG_BLOCK_MARKER: &str = "<input class=\"command hidden\" value=\"";

// Parameter-size labels inside an index block (7b, 70b, ...).
static SIZE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"x-test-size[^>]*>([^<]+)</span>").expect("size label pattern is valid")
});

// Description paragraph inside an index block.
static DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"text-neutral-800 text-md">([^<]+)</p>"#).expect("description pattern is valid")
});

// Download size paragraph following a tag value.
static TAG_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"col-span-2 text-neutral-500 text-\[13px\]">([^<]+)</p>"#)
        .expect("tag size pattern is valid")
});

static NUMERIC_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|\d+);").expect("entity pattern is valid"));

/// Extract model families from the library index page.
#[must_use]
pub fn parse_library_index(page: &str) -> Vec<RemoteModel> {
    let mut models = Vec::new();
    for block in page.split(INDEX_BLOCK_MARKER).skip(1) {
        let Some(name) = leading_attribute_value(block) else {
            continue;
        };
        // Links carrying query parameters are navigation, not models.
        if name.is_empty() || name.starts_with('?') {
            debug!(?name, "skipping non-model library link");
            continue;
        }

        let sizes: Vec<&str> = SIZE_LABEL
            .captures_iter(block)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect();
        let sizes = if sizes.is_empty() {
            "-".to_string()
        } else {
            sizes.join(", ")
        };

        let description = DESCRIPTION
            .captures(block)
            .and_then(|caps| caps.get(1))
            .map(|m| decode_entities(m.as_str().trim()))
            .unwrap_or_default();

        models.push(RemoteModel {
            name: name.to_string(),
            sizes,
            description,
        });
    }
    models
}

/// Extract tag/size pairs from a family's tag page.
#[must_use]
pub fn parse_tags_page(page: &str) -> Vec<ModelTag> {
    let mut tags = Vec::new();
    for block in page.split(TAG_BLOCK_MARKER).skip(1) {
        let Some(tag) = leading_attribute_value(block) else {
            continue;
        };
        if tag.is_empty() {
            continue;
        }

        let size = TAG_SIZE
            .captures(block)
            .and_then(|caps| caps.get(1))
            .map_or_else(|| "-".to_string(), |m| m.as_str().trim().to_string());

        tags.push(ModelTag {
            tag: tag.to_string(),
            size,
        });
    }
    tags
}

/// The run of characters up to the closing quote of the attribute the
/// block marker was split on.
fn leading_attribute_value(block: &str) -> Option<&str> {
    block.split('"').next()
}

/// Decode the HTML entities that actually occur in registry descriptions.
#[must_use]
pub fn decode_entities(text: &str) -> String {
    let decoded = NUMERIC_ENTITY.replace_all(text, |caps: &regex::Captures<'_>| {
        let body = &caps[1];
        let code = if let Some(hex) = body.strip_prefix('x') {
            u32::from_str_radix(hex, 16).ok()
        } else {
            body.parse::<u32>().ok()
        };
        code.and_then(char::from_u32)
            .map_or_else(|| caps[0].to_string(), String::from)
    });
    decoded
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    // Frozen snippet in the shape of the live library index page.
    const INDEX_SNIPPET: &str = r#"
<a href="/library/llama3.2" class="group">
  <h2>llama3.2</h2>
  <p class="text-neutral-800 text-md">Meta&#39;s Llama 3.2 goes small &amp; capable</p>
  <span x-test-size class="badge">1b</span>
  <span x-test-size class="badge">3b</span>
</a>
<a href="/library/qwen2.5-coder">
  <p class="text-neutral-800 text-md">Code-specific Qwen models</p>
  <span x-test-size>0.5b</span>
</a>
<a href="/library/?sort=popular">browse</a>
<a href="/library/embeddinggemma">
</a>
"#;

    const TAGS_SNIPPET: &str = r#"
<input class="command hidden" value="llama3.2:latest" />
<p class="col-span-2 text-neutral-500 text-[13px]">2.0GB</p>
<input class="command hidden" value="llama3.2:1b" />
<p class="col-span-2 text-neutral-500 text-[13px]">1.3GB</p>
<input class="command hidden" value="llama3.2:3b" />
"#;

    #[test]
    fn index_extracts_names_sizes_and_descriptions() {
        let models = parse_library_index(INDEX_SNIPPET);
        assert_eq!(models.len(), 3);

        assert_eq!(models[0].name, "llama3.2");
        assert_eq!(models[0].sizes, "1b, 3b");
        assert_eq!(
            models[0].description,
            "Meta's Llama 3.2 goes small & capable"
        );

        assert_eq!(models[1].name, "qwen2.5-coder");
        assert_eq!(models[1].sizes, "0.5b");
    }

    #[test]
    fn index_skips_query_parameter_links() {
        let models = parse_library_index(INDEX_SNIPPET);
        assert!(models.iter().all(|m| !m.name.starts_with('?')));
    }

    #[test]
    fn index_block_without_metadata_defaults() {
        let models = parse_library_index(INDEX_SNIPPET);
        let bare = &models[2];
        assert_eq!(bare.name, "embeddinggemma");
        assert_eq!(bare.sizes, "-");
        assert_eq!(bare.description, "");
    }

    #[test]
    fn index_with_no_markers_is_empty() {
        assert!(parse_library_index("<html><body>maintenance</body></html>").is_empty());
        assert!(parse_library_index("").is_empty());
    }

    #[test]
    fn tags_extract_value_and_nearest_size() {
        let tags = parse_tags_page(TAGS_SNIPPET);
        assert_eq!(tags.len(), 3);
        assert_eq!(
            tags[0],
            ModelTag {
                tag: "llama3.2:latest".to_string(),
                size: "2.0GB".to_string()
            }
        );
        assert_eq!(tags[1].tag, "llama3.2:1b");
        assert_eq!(tags[1].size, "1.3GB");
    }

    #[test]
    fn tag_without_size_gets_placeholder() {
        let tags = parse_tags_page(TAGS_SNIPPET);
        assert_eq!(tags[2].tag, "llama3.2:3b");
        assert_eq!(tags[2].size, "-");
    }

    #[test]
    fn entity_decoding_covers_named_and_numeric() {
        assert_eq!(decode_entities("a &amp; b"), "a & b");
        assert_eq!(decode_entities("&lt;tag&gt;"), "<tag>");
        assert_eq!(decode_entities("it&#39;s &#x2713;"), "it's ✓");
        assert_eq!(decode_entities("plain"), "plain");
    }

    #[test]
    fn unknown_entities_are_left_alone() {
        assert_eq!(decode_entities("&bogus; &#zz;"), "&bogus; &#zz;");
    }
}
