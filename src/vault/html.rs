use crate::vault::list_status::ItemStatus;
use crate::vault::paths::HTML_INDEX_FILE;
use crate::vault::sync::ItemOutcome;
use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};

const STYLE: &str = r#"        body {
            font-family: Arial, sans-serif;
            max-width: 1200px;
            margin: 0 auto;
            padding: 20px;
            background-color: #f5f5f5;
        }
        h1 {
            color: #333;
            border-bottom: 3px solid #cc0000;
            padding-bottom: 10px;
        }
        .info, .video-item {
            background-color: #fff;
            border-radius: 5px;
            box-shadow: 0 2px 4px rgba(0,0,0,0.1);
        }
        .info {
            padding: 15px;
            margin-bottom: 20px;
        }
        .video-list {
            list-style: none;
            padding: 0;
        }
        .video-item {
            margin-bottom: 10px;
            padding: 15px;
            display: flex;
            align-items: center;
        }
        .video-number {
            font-weight: bold;
            color: #cc0000;
            margin-right: 15px;
            min-width: 40px;
        }
        .video-link {
            color: #1a73e8;
            text-decoration: none;
            flex-grow: 1;
        }
        .video-link:hover {
            text-decoration: underline;
        }
        .status {
            padding: 3px 8px;
            border-radius: 3px;
            font-size: 12px;
            margin-left: 10px;
        }
        .downloaded {
            background-color: #d4edda;
            color: #155724;
        }
        .failed {
            background-color: #f8d7da;
            color: #721c24;
        }
"#;

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn status_badge(status: Option<ItemStatus>) -> String {
    match status {
        Some(ItemStatus::Downloaded) => {
            r#"<span class="status downloaded">Downloaded</span>"#.to_string()
        }
        Some(ItemStatus::Failed) => r#"<span class="status failed">Failed</span>"#.to_string(),
        None => String::new(),
    }
}

pub fn render_list_index(title: &str, items: &[ItemOutcome], updated_at: NaiveDateTime) -> String {
    let title = escape_html(title);
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    out.push_str("    <meta charset=\"UTF-8\">\n");
    out.push_str(
        "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );
    out.push_str(&format!("    <title>{title}</title>\n"));
    out.push_str("    <style>\n");
    out.push_str(STYLE);
    out.push_str("    </style>\n</head>\n<body>\n");
    out.push_str(&format!("    <h1>{title}</h1>\n\n"));
    out.push_str("    <div class=\"info\">\n");
    out.push_str(&format!(
        "        <p><strong>Total Videos:</strong> {}</p>\n",
        items.len()
    ));
    out.push_str(&format!(
        "        <p><strong>Last Updated:</strong> {}</p>\n",
        updated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str("    </div>\n\n    <ol class=\"video-list\">\n");

    for item in items {
        out.push_str("        <li class=\"video-item\">\n");
        out.push_str(&format!(
            "            <span class=\"video-number\">{}.</span>\n",
            item.position + 1
        ));
        out.push_str(&format!(
            "            <a href=\"{}\" class=\"video-link\" target=\"_blank\">{}</a>\n",
            escape_html(&item.url),
            escape_html(&item.title)
        ));
        let badge = status_badge(item.status);
        if !badge.is_empty() {
            out.push_str(&format!("            {badge}\n"));
        }
        out.push_str("        </li>\n");
    }

    out.push_str("    </ol>\n</body>\n</html>\n");
    out
}

pub fn write_list_index(list_dir: &Path, title: &str, items: &[ItemOutcome]) -> Result<PathBuf> {
    let path = list_dir.join(HTML_INDEX_FILE);
    let html = render_list_index(title, items, Local::now().naive_local());
    fs::write(&path, html).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::sync::ItemAction;
    use chrono::NaiveDate;

    fn item(position: usize, title: &str, status: Option<ItemStatus>) -> ItemOutcome {
        ItemOutcome {
            id: format!("id{position}"),
            title: title.to_string(),
            url: format!("https://www.youtube.com/watch?v=id{position}"),
            position,
            status,
            action: ItemAction::Skipped,
        }
    }

    #[test]
    fn renders_positions_badges_and_escapes_titles() {
        let at = NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_opt(8, 30, 0))
            .expect("date");
        let html = render_list_index(
            "Rock & Roll",
            &[
                item(0, "<intro>", Some(ItemStatus::Downloaded)),
                item(1, "Second", Some(ItemStatus::Failed)),
            ],
            at,
        );

        assert!(html.contains("<title>Rock &amp; Roll</title>"));
        assert!(html.contains("<strong>Total Videos:</strong> 2"));
        assert!(html.contains("<strong>Last Updated:</strong> 2024-05-01 08:30:00"));
        assert!(html.contains(r#"<span class="video-number">1.</span>"#));
        assert!(html.contains("&lt;intro&gt;"));
        assert!(html.contains(r#"<span class="status downloaded">Downloaded</span>"#));
        assert!(html.contains(r#"<span class="video-number">2.</span>"#));
        assert!(html.contains(r#"<span class="status failed">Failed</span>"#));
        let first = html.find("id0").expect("first");
        let second = html.find("id1").expect("second");
        assert!(first < second);
    }
}
