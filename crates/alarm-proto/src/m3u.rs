/// A playable entry of an M3U list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct M3uEntry {
    pub name: String,
    pub location: String,
}

pub fn parse_m3u_from_str(content: &str) -> Vec<M3uEntry> {
    let mut entries = Vec::new();
    let mut pending_name: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("#EXTINF:") {
            if let Some(comma_idx) = rest.find(',') {
                pending_name = Some(rest[comma_idx + 1..].trim().to_string());
            }
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        let location = line.to_string();
        let name = pending_name
            .take()
            .unwrap_or_else(|| display_name(&location));

        entries.push(M3uEntry { name, location });
    }

    entries
}

/// Last path segment without extension, used when no `#EXTINF` title exists.
fn display_name(location: &str) -> String {
    let segment = location
        .trim_end_matches('/')
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(location);
    let stem = match segment.rfind('.') {
        Some(dot) if dot > 0 => &segment[..dot],
        _ => segment,
    };
    if stem.is_empty() {
        location.to_string()
    } else {
        stem.to_string()
    }
}

/// Loads an M3U list from an `http(s)://` URL or a local file path.
pub async fn load_m3u(client: &reqwest::Client, source: &str) -> anyhow::Result<Vec<M3uEntry>> {
    let content = if source.starts_with("http://") || source.starts_with("https://") {
        let response = client.get(source).send().await?.error_for_status()?;
        response.text().await?
    } else {
        tokio::fs::read_to_string(source).await?
    };
    Ok(parse_m3u_from_str(&content))
}
