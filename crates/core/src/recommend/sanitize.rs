const EMPHASIS_MARKERS: [&str; 3] = ["**", "*", "#"];

const PREAMBLES: [&str; 6] = [
    "Here are my recommendations:",
    "Here are some recommendations:",
    "Recommendations:",
    "My recommendations:",
    "I recommend:",
    "I would recommend:",
];

/// Strips emphasis markers and known preambles, then forces one `- ` bullet per non-empty line.
pub fn sanitize(raw: &str) -> String {
    let mut text = raw.to_string();
    for marker in EMPHASIS_MARKERS {
        text = text.replace(marker, "");
    }

    let mut text = text.trim_start();
    for preamble in PREAMBLES {
        if let Some(rest) = strip_prefix_ignore_case(text, preamble) {
            text = rest.trim_start();
            break;
        }
    }

    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .map(|line| match line.strip_prefix('-') {
            Some(rest) => format!("- {}", rest.trim_start()),
            None => format!("- {line}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &text[prefix.len()..])
}
