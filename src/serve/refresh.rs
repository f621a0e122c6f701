//! Browser auto-refresh.
//!
//! Every HTML response the preview server sends carries a small script. It
//! remembers the build time the page was served with, polls the last-build
//! endpoint and reloads the page once a newer build is available.

use super::LAST_BUILD_ENDPOINT;
use std::time::Duration;

/// The refresh script for a page served after the build finished at `last_build`.
pub fn script(last_build: u64, interval: Duration) -> String {
    let interval = interval.as_millis();
    format!(
        r#"<script>
(function () {{
    var served = {last_build};
    function poll() {{
        fetch("/{LAST_BUILD_ENDPOINT}", {{ cache: "no-store" }})
            .then(function (response) {{ return response.text(); }})
            .then(function (text) {{
                if (parseInt(text, 10) > served) {{
                    window.location.reload();
                }} else {{
                    setTimeout(poll, {interval});
                }}
            }})
            .catch(function () {{ setTimeout(poll, {interval}); }});
    }}
    setTimeout(poll, {interval});
}})();
</script>"#
    )
}

/// Insert `script` before the last `</body>` of `html`. Documents without a
/// `<body>` element are returned as `None` and served unchanged.
pub fn inject(html: &str, script: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets aligned with `html`.
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<body")?;
    let close = lower.rfind("</body>")?;
    if close < open {
        return None;
    }
    let mut out = String::with_capacity(html.len() + script.len());
    out.push_str(&html[..close]);
    out.push_str(script);
    out.push_str(&html[close..]);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_polls_endpoint_with_served_time() {
        let script = script(1234, Duration::from_millis(500));
        assert!(script.contains("var served = 1234;"));
        assert!(script.contains(r#"fetch("/lastbuild""#));
        assert!(script.contains("setTimeout(poll, 500)"));
        assert!(script.contains("> served"));
    }

    #[test]
    fn inject_before_last_closing_body() {
        let html = "<html><BODY><p>x</p><!-- </body> --></Body></html>";
        let out = inject(html, "<script></script>").unwrap();
        assert_eq!(out, "<html><BODY><p>x</p><!-- </body> --><script></script></Body></html>");
    }

    #[test]
    fn inject_requires_body_pair() {
        assert_eq!(inject("<p>fragment</p>", "<script></script>"), None);
        assert_eq!(inject("</body><body>", "<script></script>"), None);
    }
}
