//! Usage statistics display

use delve_api::Stats;

/// Render the counters as a short report
pub fn format_stats(stats: &Stats) -> String {
    format!(
        "Usage statistics:\n\n  Queries:        {}\n  Sessions:       {}\n  Tokens used:    {}\n  Avg. response:  {:.2}s",
        stats.total_queries, stats.total_sessions, stats.total_tokens, stats.avg_response_time
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_stats() {
        let stats = Stats {
            total_queries: 12,
            total_sessions: 3,
            total_tokens: 4500,
            avg_response_time: 1.234,
        };
        let text = format_stats(&stats);
        assert!(text.contains("Queries:        12"));
        assert!(text.contains("Sessions:       3"));
        assert!(text.contains("Tokens used:    4500"));
        assert!(text.ends_with("1.23s"));
    }
}
