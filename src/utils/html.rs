/// Strip markup from a rich-text `matter` field so it can be shown in a
/// single-line input. Tags are dropped, block boundaries become spaces, and
/// the handful of entities the editor emits are decoded.
pub fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut chars = html.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '<' => {
                for inner in chars.by_ref() {
                    if inner == '>' {
                        break;
                    }
                }
                if !out.ends_with(' ') && !out.is_empty() {
                    out.push(' ');
                }
            }
            '&' => {
                let mut entity = String::new();
                while let Some(&next) = chars.peek() {
                    if next == ';' {
                        chars.next();
                        break;
                    }
                    if entity.len() > 8 || next == '<' || next == '&' {
                        break;
                    }
                    entity.push(next);
                    chars.next();
                }
                match entity.as_str() {
                    "amp" => out.push('&'),
                    "lt" => out.push('<'),
                    "gt" => out.push('>'),
                    "quot" => out.push('"'),
                    "nbsp" => out.push(' '),
                    "#39" | "apos" => out.push('\''),
                    other => {
                        out.push('&');
                        out.push_str(other);
                    }
                }
            }
            _ => out.push(ch),
        }
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Like [`html_to_text`], but block boundaries survive: `</p>` becomes a
/// blank line and `<br>` a newline before tags are stripped, so the result
/// round-trips through [`text_to_html_paragraphs`]. Plain text passes
/// through with its paragraph structure intact.
pub fn html_to_paragraph_text(content: &str) -> String {
    let normalized = content
        .replace("\r\n", "\n")
        .replace("</p>", "\n\n")
        .replace("<br />", "\n")
        .replace("<br/>", "\n")
        .replace("<br>", "\n");

    normalized
        .split("\n\n")
        .map(|block| {
            block
                .lines()
                .map(html_to_text)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .filter(|block| !block.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Convert stored plain text into the HTML the page editor expects: blank
/// lines delimit paragraphs, single newlines become `<br>`.
pub fn text_to_html_paragraphs(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    let paragraphs: Vec<String> = normalized
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", escape(p).replace('\n', "<br>")))
        .collect();
    paragraphs.join("")
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}
