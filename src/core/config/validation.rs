use serde_json::{Map, Value};

use crate::core::errors::ApiError;

const SEARCH_PROVIDERS: [&str; 5] = ["duckduckgo", "google", "bing", "brave", "custom"];

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
    }

    if let Some(llm) = expect_optional_object(root, "llm")? {
        validate_optional_string_field(llm, "llm.base_url", "base_url")?;
        validate_optional_string_field(llm, "llm.chat_model", "chat_model")?;
        validate_optional_string_field(llm, "llm.embedding_model", "embedding_model")?;
        validate_f64_field(llm, "llm.temperature", "temperature", 0.0, 2.0)?;
        validate_u64_field(llm, "llm.timeout_secs", "timeout_secs", 1, 3_600)?;
    }

    if let Some(rag) = expect_optional_object(root, "rag")? {
        validate_u64_field(rag, "rag.chunk_size", "chunk_size", 50, 100_000)?;
        validate_u64_field(rag, "rag.chunk_overlap", "chunk_overlap", 0, 50_000)?;
        validate_u64_field(rag, "rag.top_k", "top_k", 1, 100)?;
        validate_bool_field(rag, "rag.summarize_on_upload", "summarize_on_upload")?;
        validate_u64_field(
            rag,
            "rag.max_upload_bytes",
            "max_upload_bytes",
            1,
            1_000_000_000,
        )?;

        let size = rag.get("chunk_size").and_then(|v| v.as_u64());
        let overlap = rag.get("chunk_overlap").and_then(|v| v.as_u64());
        if let (Some(size), Some(overlap)) = (size, overlap) {
            if overlap >= size {
                return Err(ApiError::BadRequest(
                    "Invalid config at 'rag.chunk_overlap': must be smaller than chunk_size"
                        .to_string(),
                ));
            }
        }
    }

    if let Some(agent) = expect_optional_object(root, "agent")? {
        validate_u64_field(agent, "agent.max_iter", "max_iter", 0, 20)?;
        validate_u64_field(agent, "agent.max_iter_cap", "max_iter_cap", 0, 20)?;
        validate_u64_field(agent, "agent.recursion_limit", "recursion_limit", 7, 10_000)?;
        validate_u64_field(
            agent,
            "agent.min_context_chars",
            "min_context_chars",
            0,
            100_000,
        )?;
        validate_u64_field(
            agent,
            "agent.max_context_chars",
            "max_context_chars",
            100,
            1_000_000,
        )?;
        validate_u64_field(
            agent,
            "agent.max_consecutive_failures",
            "max_consecutive_failures",
            1,
            100,
        )?;
        validate_u64_field(agent, "agent.timeout_secs", "timeout_secs", 1, 86_400)?;
        validate_string_array_field(agent, "agent.recency_keywords", "recency_keywords")?;
    }

    if let Some(scraper) = expect_optional_object(root, "scraper")? {
        validate_u64_field(scraper, "scraper.max_chars", "max_chars", 100, 1_000_000)?;
        validate_u64_field(scraper, "scraper.timeout_secs", "timeout_secs", 1, 600)?;
        validate_u64_field(scraper, "scraper.max_attempts", "max_attempts", 1, 10)?;
        validate_u64_field(
            scraper,
            "scraper.retry_delay_ms",
            "retry_delay_ms",
            0,
            60_000,
        )?;
        validate_optional_string_field(scraper, "scraper.browser_path", "browser_path")?;
        validate_optional_string_field(scraper, "scraper.hosted_base_url", "hosted_base_url")?;
    }

    if let Some(tools) = expect_optional_object(root, "tools")? {
        if let Some(value) = tools.get("search_provider") {
            let provider = value
                .as_str()
                .ok_or_else(|| config_type_error("tools.search_provider", "string"))?;
            if !SEARCH_PROVIDERS.contains(&provider.to_lowercase().as_str()) {
                return Err(ApiError::BadRequest(format!(
                    "Invalid config at 'tools.search_provider': expected one of {}",
                    SEARCH_PROVIDERS.join(", ")
                )));
            }
        }
        validate_optional_string_field(tools, "tools.custom_search_url", "custom_search_url")?;
        validate_bool_field(tools, "tools.optimize_queries", "optimize_queries")?;
        validate_u64_field(tools, "tools.scrape_top_n", "scrape_top_n", 0, 20)?;
        validate_u64_field(tools, "tools.cache_ttl_secs", "cache_ttl_secs", 0, 604_800)?;
        validate_u64_field(
            tools,
            "tools.cache_max_entries",
            "cache_max_entries",
            1,
            1_000_000,
        )?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(config_type_error(key, "object")),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() || value.as_str().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "string"))
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_empty_and_well_formed_config() {
        assert!(validate_config(&json!({})).is_ok());
        assert!(validate_config(&json!({
            "llm": { "chat_model": "llama3", "temperature": 0.2 },
            "rag": { "chunk_size": 1000, "chunk_overlap": 200 },
            "agent": { "max_iter": 2, "recency_keywords": ["latest", "today"] },
            "tools": { "search_provider": "brave" }
        }))
        .is_ok());
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk_size() {
        let err = validate_config(&json!({
            "rag": { "chunk_size": 200, "chunk_overlap": 200 }
        }))
        .unwrap_err();
        assert!(err.message().contains("rag.chunk_overlap"));
    }

    #[test]
    fn rejects_unknown_search_provider_and_bad_types() {
        assert!(validate_config(&json!({ "tools": { "search_provider": "altavista" } })).is_err());
        assert!(validate_config(&json!({ "agent": { "max_iter": "two" } })).is_err());
        assert!(validate_config(&json!({ "agent": { "recency_keywords": ["", "x"] } })).is_err());
        assert!(validate_config(&json!({ "llm": [] })).is_err());
    }
}
