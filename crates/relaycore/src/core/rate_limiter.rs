use std::collections::VecDeque;

use dashmap::DashMap;
use tokio::time::{Duration, Instant};

use crate::core::config::RateLimitConfig;
use crate::core::types::Identity;

/// Результат проверки лимита.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// Окно заполнено; через сколько секунд освободится место
    Denied { retry_after_secs: u64 },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

/// Rate limiter со скользящим окном для каждого пользователя.
///
/// Для каждого пользователя хранится очередь временных меток принятых
/// запросов. Запрос принимается, если за последние `window` секунд принято
/// меньше `max_requests` запросов. Отклонённые запросы не записываются.
///
/// Проверка и запись выполняются под одной блокировкой шарда `DashMap`,
/// поэтому два параллельных запроса одного пользователя не могут оба занять
/// последнее место в окне.
pub struct RateLimiter {
    windows: DashMap<Identity, VecDeque<Instant>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests: config.max_requests,
            window: config.window,
        }
    }

    /// Проверяет и, если можно, записывает запрос пользователя.
    pub fn check(&self, identity: Identity) -> Admission {
        self.check_at(identity, Instant::now())
    }

    /// То же, что [`check`](Self::check), но с явным моментом времени.
    pub fn check_at(&self, identity: Identity, now: Instant) -> Admission {
        let mut stamps = self.windows.entry(identity).or_default();
        prune(&mut stamps, now, self.window);

        if stamps.len() < self.max_requests {
            stamps.push_back(now);
            return Admission::Allowed;
        }

        let oldest = stamps.front().copied().unwrap_or(now);
        let elapsed = now.saturating_duration_since(oldest);
        let remaining = self.window.saturating_sub(elapsed);
        Admission::Denied {
            retry_after_secs: ceil_secs(remaining).max(1),
        }
    }

    /// Удаляет пользователей, у которых окно опустело.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, stamps| {
            prune(stamps, now, self.window);
            !stamps.is_empty()
        });
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            log::debug!("Rate limiter sweep removed {} idle users", removed);
        }
        removed
    }

    /// Количество пользователей с непустым окном.
    pub fn tracked_identities(&self) -> usize {
        self.windows.len()
    }
}

fn prune(stamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = stamps.front() {
        if now.saturating_duration_since(front) >= window {
            stamps.pop_front();
        } else {
            break;
        }
    }
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: usize, window_secs: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(window_secs),
        })
    }

    #[test]
    fn test_sixth_request_in_window_is_denied() {
        let limiter = limiter(5, 60);
        let start = Instant::now();
        let user = Identity(7);

        for i in 0..5 {
            let at = start + Duration::from_secs(i * 2);
            assert_eq!(limiter.check_at(user, at), Admission::Allowed, "request {}", i);
        }
        let sixth = limiter.check_at(user, start + Duration::from_secs(10));
        assert_eq!(sixth, Admission::Denied { retry_after_secs: 50 });
    }

    #[test]
    fn test_window_slides() {
        let limiter = limiter(2, 60);
        let start = Instant::now();
        let user = Identity(1);

        assert!(limiter.check_at(user, start).is_allowed());
        assert!(limiter.check_at(user, start + Duration::from_secs(30)).is_allowed());
        assert!(!limiter.check_at(user, start + Duration::from_secs(59)).is_allowed());
        // First stamp is exactly one window old and no longer counts
        assert!(limiter.check_at(user, start + Duration::from_secs(60)).is_allowed());
    }

    #[test]
    fn test_denied_requests_are_not_recorded() {
        let limiter = limiter(1, 10);
        let start = Instant::now();
        let user = Identity(3);

        assert!(limiter.check_at(user, start).is_allowed());
        for s in 1..10 {
            assert!(!limiter.check_at(user, start + Duration::from_secs(s)).is_allowed());
        }
        assert!(limiter.check_at(user, start + Duration::from_secs(10)).is_allowed());
    }

    #[test]
    fn test_retry_after_is_at_least_one_second() {
        let limiter = limiter(1, 1);
        let start = Instant::now();
        let user = Identity(9);

        assert!(limiter.check_at(user, start).is_allowed());
        let denied = limiter.check_at(user, start + Duration::from_millis(999));
        assert_eq!(denied, Admission::Denied { retry_after_secs: 1 });
    }

    #[test]
    fn test_users_are_independent() {
        let limiter = limiter(1, 60);
        let now = Instant::now();
        assert!(limiter.check_at(Identity(1), now).is_allowed());
        assert!(limiter.check_at(Identity(2), now).is_allowed());
        assert!(!limiter.check_at(Identity(1), now).is_allowed());
    }

    #[test]
    fn test_sweep_drops_idle_users() {
        let limiter = limiter(5, 60);
        let start = Instant::now();
        limiter.check_at(Identity(1), start);
        limiter.check_at(Identity(2), start + Duration::from_secs(30));
        assert_eq!(limiter.tracked_identities(), 2);

        assert_eq!(limiter.sweep_at(start + Duration::from_secs(61)), 1);
        assert_eq!(limiter.tracked_identities(), 1);
    }

    #[test]
    fn test_concurrent_checks_never_exceed_quota() {
        let limiter = std::sync::Arc::new(limiter(5, 60));
        let now = Instant::now();
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || limiter.check_at(Identity(11), now).is_allowed())
            })
            .collect();
        let allowed = handles.into_iter().map(|h| h.join().unwrap()).filter(|a| *a).count();
        assert_eq!(allowed, 5);
    }
}
