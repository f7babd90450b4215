// ── Watchbot LLM: Model pricing ────────────────────────────────────────────
// Static per-million-token rates for the models the pipeline is likely to be
// pointed at. Unknown models (local Ollama, exotic deployments) cost 0 —
// better to under-report than to invent numbers.

/// (input $/1M tokens, output $/1M tokens)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrice {
    pub input: f64,
    pub output: f64,
}

/// Look up pricing for a model. Prefix-matched so dated snapshots
/// ("gpt-4o-2024-08-06") hit the same row as their family name.
pub fn model_price(model: &str) -> Option<ModelPrice> {
    // Normalize: strip provider prefixes like "anthropic/"
    let m = model.split('/').next_back().unwrap_or(model);
    let price = match m {
        // Anthropic
        s if s.starts_with("claude-3-5-haiku") => ModelPrice { input: 0.80, output: 4.00 },
        s if s.starts_with("claude-3-haiku") => ModelPrice { input: 0.25, output: 1.25 },
        s if s.starts_with("claude-sonnet-4") || s.starts_with("claude-3-5-sonnet") =>
            ModelPrice { input: 3.00, output: 15.00 },
        s if s.starts_with("claude-opus-4") || s.starts_with("claude-3-opus") =>
            ModelPrice { input: 15.00, output: 75.00 },
        // Google
        s if s.starts_with("gemini-2.5-flash-lite") => ModelPrice { input: 0.05, output: 0.20 },
        s if s.starts_with("gemini-2.0-flash") || s.starts_with("gemini-2.5-flash") =>
            ModelPrice { input: 0.15, output: 0.60 },
        s if s.starts_with("gemini-2.5-pro") || s.starts_with("gemini-1.5-pro") =>
            ModelPrice { input: 1.25, output: 10.00 },
        // OpenAI
        s if s.starts_with("gpt-4o-mini") || s.starts_with("gpt-4.1-mini") || s.starts_with("gpt-4.1-nano") =>
            ModelPrice { input: 0.15, output: 0.60 },
        s if s.starts_with("gpt-4o") || s.starts_with("gpt-4.1") =>
            ModelPrice { input: 2.50, output: 10.00 },
        s if s.starts_with("o4-mini") || s.starts_with("o3-mini") =>
            ModelPrice { input: 1.10, output: 4.40 },
        // Minimax
        s if s.starts_with("abab6.5s") => ModelPrice { input: 0.20, output: 0.20 },
        s if s.starts_with("minimax-text") => ModelPrice { input: 0.20, output: 1.10 },
        _ => return None,
    };
    Some(price)
}

/// Estimate USD cost given token counts and model name.
pub fn estimate_cost_usd(model: &str, tokens_in: u64, tokens_out: u64) -> f64 {
    match model_price(model) {
        Some(p) => {
            tokens_in as f64 * p.input / 1_000_000.0 + tokens_out as f64 * p.output / 1_000_000.0
        }
        None => 0.0,
    }
}
