use rand::Rng;
use std::time::Duration;

pub mod validation;

/// Indices of the `k` highest scores, best first. NaN scores rank last.
pub fn top_k_indices(scores: &[f64], k: usize) -> Vec<usize> {
    let mut indexed_scores: Vec<(usize, f64)> = scores.iter().copied().enumerate().collect();

    indexed_scores.sort_by(|a, b| match (a.1.is_nan(), b.1.is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal),
    });

    indexed_scores
        .into_iter()
        .take(k)
        .map(|(i, _)| i)
        .collect()
}

/// Case-insensitive substring match.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub async fn retry_with_backoff<F, Fut, T, E>(
    mut operation: F,
    max_retries: usize,
    initial_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = initial_delay;
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt >= max_retries => return Err(e),
            Err(e) => {
                attempt += 1;
                let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=delay.as_millis() as u64 / 4));
                tracing::warn!(
                    "Operation failed (attempt {}), retrying in {:?}: {}",
                    attempt,
                    delay + jitter,
                    e
                );
                tokio::time::sleep(delay + jitter).await;
                delay *= 2;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_top_k_indices() {
        let scores = vec![0.1, 0.5, 0.3, 0.9, 0.2];
        assert_eq!(top_k_indices(&scores, 2), vec![3, 1]);

        let with_nan = vec![f64::NAN, 0.2, 0.7];
        assert_eq!(top_k_indices(&with_nan, 3), vec![2, 1, 0]);
    }

    #[test]
    fn test_contains_ignore_case() {
        assert!(contains_ignore_case("Deep Learning Survey", "learning"));
        assert!(!contains_ignore_case("Graph Theory", "learning"));
    }

    #[tokio::test]
    async fn test_retry_with_backoff_eventually_succeeds() {
        let calls = AtomicUsize::new(0);
        let result: Result<usize, String> = retry_with_backoff(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(format!("attempt {} failed", n))
                    } else {
                        Ok(n)
                    }
                }
            },
            3,
            Duration::from_millis(1),
        )
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_with_backoff_gives_up() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), String> = retry_with_backoff(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("down".to_string()) }
            },
            2,
            Duration::from_millis(1),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
