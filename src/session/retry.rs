//! 重连策略 - 指数退避 + 最大次数
//!
//! 第 n 次重连（从 1 开始）的延迟为 `base × multiplier^(n-1)`。
//! 默认 1s / ×2 / 5 次，即 1, 2, 4, 8, 16 秒。

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 重连策略（不可变）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, multiplier: f64, max_attempts: u32) -> Self {
        Self {
            base_delay_ms: base_delay.as_millis().min(u64::MAX as u128) as u64,
            multiplier,
            max_attempts,
        }
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// 第 `attempt` 次重连的延迟（attempt 从 1 开始，0 按 1 处理）
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.max(1) - 1;
        // 小于 1 的倍数会让延迟递减，按 1 处理
        let multiplier = if self.multiplier.is_finite() {
            self.multiplier.max(1.0)
        } else {
            1.0
        };
        let factor = multiplier.powi(exponent.min(i32::MAX as u32) as i32);
        // f64 -> u64 的 as 转换是饱和的
        let millis = (self.base_delay_ms as f64 * factor).round() as u64;
        Duration::from_millis(millis)
    }

    /// 所有可能的重连延迟
    pub fn schedule(&self) -> Vec<Duration> {
        (1..=self.max_attempts)
            .map(|n| self.delay_for_attempt(n))
            .collect()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            multiplier: 2.0,
            max_attempts: 5,
        }
    }
}

/// 自上次成功连接以来的重连次数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    attempts: u32,
}

impl RetryState {
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// 计入下一次重连，返回 (次数, 延迟)；次数已耗尽时返回 None
    pub fn next_attempt(&mut self, policy: &RetryPolicy) -> Option<(u32, Duration)> {
        if self.attempts >= policy.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some((self.attempts, policy.delay_for_attempt(self.attempts)))
    }

    pub fn is_exhausted(&self, policy: &RetryPolicy) -> bool {
        self.attempts >= policy.max_attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.schedule(),
            [1, 2, 4, 8, 16].map(Duration::from_secs).to_vec()
        );
    }

    #[test]
    fn test_custom_multiplier() {
        let policy = RetryPolicy::new(Duration::from_millis(100), 3.0, 4);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(900));
    }

    #[test]
    fn test_attempt_zero_uses_base() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
    }

    #[test]
    fn test_huge_attempt_saturates() {
        let policy = RetryPolicy::new(Duration::from_secs(1), 2.0, u32::MAX);
        assert_eq!(
            policy.delay_for_attempt(5_000),
            Duration::from_millis(u64::MAX)
        );
    }

    #[test]
    fn test_sub_one_multiplier_is_constant() {
        let policy = RetryPolicy::new(Duration::from_millis(500), 0.5, 3);
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(500));
    }

    #[test]
    fn test_retry_state_exhausts_and_resets() {
        let policy = RetryPolicy::new(Duration::from_millis(10), 2.0, 2);
        let mut state = RetryState::default();

        assert_eq!(state.next_attempt(&policy), Some((1, Duration::from_millis(10))));
        assert_eq!(state.next_attempt(&policy), Some((2, Duration::from_millis(20))));
        assert_eq!(state.next_attempt(&policy), None);
        assert_eq!(state.attempts(), 2);
        assert!(state.is_exhausted(&policy));

        state.reset();
        assert_eq!(state.attempts(), 0);
        assert!(!state.is_exhausted(&policy));
    }

    #[test]
    fn test_zero_max_attempts_never_retries() {
        let policy = RetryPolicy::new(Duration::from_secs(1), 2.0, 0);
        let mut state = RetryState::default();
        assert_eq!(state.next_attempt(&policy), None);
        assert!(policy.schedule().is_empty());
    }

    #[test]
    fn test_policy_deserializes_with_defaults() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"max_attempts": 3}"#).unwrap();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay_ms, 1_000);
        assert_eq!(policy.multiplier, 2.0);
    }
}
