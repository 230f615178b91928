use serde::{Deserialize, Serialize};

/// Service endpoint metadata with secrets redacted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactedEndpoint {
    pub scheme: Option<String>,
    pub user: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub redacted: String,
}

/// Redact secrets from a service URL while extracting non-sensitive metadata.
pub fn redact_endpoint(url: &str) -> RedactedEndpoint {
    let mut redacted = url.to_string();
    let mut scheme = None;
    let mut user = None;
    let mut host = None;
    let mut port = None;
    let mut path = None;

    if let Some(scheme_end) = url.find("://") {
        scheme = Some(url[..scheme_end].to_string());
        let after_scheme = &url[scheme_end + 3..];
        let authority_end = after_scheme.find(['/', '?']).unwrap_or(after_scheme.len());
        let authority = &after_scheme[..authority_end];
        let (auth_part, host_port) = match authority.rfind('@') {
            Some(at_idx) => (&authority[..at_idx], &authority[at_idx + 1..]),
            None => ("", authority),
        };

        if !auth_part.is_empty() {
            if let Some(colon_idx) = auth_part.find(':') {
                user = Some(auth_part[..colon_idx].to_string());
                let password_start = scheme_end + 3 + colon_idx + 1;
                let password_end = scheme_end + 3 + auth_part.len();
                redacted.replace_range(password_start..password_end, "***");
            } else {
                user = Some(auth_part.to_string());
            }
        }

        if !host_port.is_empty() {
            match host_port.rfind(':') {
                Some(colon_idx) if !host_port.ends_with(']') => {
                    host = Some(host_port[..colon_idx].to_string());
                    port = host_port[colon_idx + 1..].parse::<u16>().ok();
                }
                _ => host = Some(host_port.to_string()),
            }
        }

        let rest = &after_scheme[authority_end..];
        let rest_path = rest.split('?').next().unwrap_or("");
        if !rest_path.is_empty() && rest_path != "/" {
            path = Some(rest_path.to_string());
        }
    }

    RedactedEndpoint {
        scheme,
        user,
        host,
        port,
        path,
        redacted: redact_query_params(&redacted),
    }
}

fn redact_query_params(url: &str) -> String {
    let Some(query_start) = url.find('?') else {
        return url.to_string();
    };

    let (base, query) = url.split_at(query_start + 1);
    let mut redacted_params = Vec::new();

    for pair in query.split('&') {
        let mut iter = pair.splitn(2, '=');
        let key = iter.next().unwrap_or("");
        let value = iter.next().unwrap_or("");
        if is_sensitive_key(key) {
            redacted_params.push(format!("{key}=***"));
        } else if value.is_empty() {
            redacted_params.push(key.to_string());
        } else {
            redacted_params.push(format!("{key}={value}"));
        }
    }

    format!("{base}{}", redacted_params.join("&"))
}

fn is_sensitive_key(key: &str) -> bool {
    matches!(
        key.to_lowercase().as_str(),
        "password" | "pass" | "token" | "api_key" | "apikey" | "access_token"
    )
}
