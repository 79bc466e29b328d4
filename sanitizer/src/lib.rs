/*!
# Tender Sanitizer

Cleans text scraped out of tender-listing HTML before it is merged.

Two policies:

- **single-line** (default) for short fields: every whitespace run, line
  breaks included, becomes one space;
- **multi-line** for prose fields (descriptions, comments, reasons): paragraph
  breaks survive, capped at one blank line.

```rust
use serde_json::json;
use tender_sanitizer::RecordSanitizer;

let sanitizer = RecordSanitizer::default();
let clean = sanitizer.sanitize(json!({
    "title": "  Road\u{00A0}works\n",
    "description": "Stage 1\r\n\r\n\r\nStage 2",
}));

assert_eq!(clean["title"], "Road works");
assert_eq!(clean["description"], "Stage 1\n\nStage 2");
```
*/

mod record;
mod text;

pub use record::RecordSanitizer;
pub use record::SanitizerConfig;
pub use text::TextPolicy;
pub use text::is_name_like;
pub use text::sanitize_multi_line;
pub use text::sanitize_single_line;
pub use text::sanitize_value;
