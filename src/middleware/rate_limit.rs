use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::keyed::DashMapStateStore,
    Quota, RateLimiter,
};
use std::{net::IpAddr, net::SocketAddr, num::NonZeroU32, time::Duration};

use crate::config::Settings;
use crate::error::ApiError;
use crate::AppState;

type KeyedLimiter = RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock, NoOpMiddleware>;

/// Per-client token bucket in front of every API endpoint. Capacity is
/// `rate_limit_requests` tokens refilled evenly over
/// `rate_limit_window_seconds`. State is process-local and lost on
/// restart.
pub struct RateGovernor {
    limiter: KeyedLimiter,
    clock: DefaultClock,
    trust_x_forwarded_for: bool,
}

impl RateGovernor {
    pub fn new(settings: &Settings) -> Self {
        let requests = NonZeroU32::new(settings.rate_limit_requests)
            .unwrap_or_else(|| NonZeroU32::new(60).unwrap());
        let window = Duration::from_secs(settings.rate_limit_window_seconds.max(1) as u64);

        let period = (window / requests.get()).max(Duration::from_nanos(1));
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(requests))
            .allow_burst(requests);

        let clock = DefaultClock::default();
        Self {
            limiter: RateLimiter::dashmap_with_clock(quota, &clock),
            clock,
            trust_x_forwarded_for: settings.trust_x_forwarded_for,
        }
    }

    /// Admit or deny one request from `client`. On denial the caller gets
    /// the duration after which a retry can succeed.
    pub fn admit(&self, client: IpAddr) -> Result<(), Duration> {
        self.limiter
            .check_key(&client)
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    /// Derive the client identity: the forwarded address when explicitly
    /// trusted, the peer address otherwise.
    pub fn identify(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
        if self.trust_x_forwarded_for {
            if let Some(forwarded) = headers
                .get("x-forwarded-for")
                .and_then(|value| value.to_str().ok())
            {
                if let Some(first) = forwarded.split(',').next() {
                    if let Ok(ip) = first.trim().parse::<IpAddr>() {
                        return ip;
                    }
                }
            }
        }
        peer.map(|addr| addr.ip())
            .unwrap_or_else(|| IpAddr::from([127, 0, 0, 1]))
    }
}

/// Rate limiting middleware for the API routes.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let Some(ref governor) = state.governor else {
        return next.run(request).await;
    };

    let client = governor.identify(request.headers(), Some(peer));
    match governor.admit(client) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            let retry_secs = retry_after.as_secs().max(1);
            let mut response =
                ApiError::RateLimit("Rate limit exceeded".to_string()).into_response();
            if let Ok(value) = HeaderValue::from_str(&retry_secs.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn governor(requests: u32, window_seconds: u32) -> RateGovernor {
        let mut settings = Settings::new_with_env_file(false).unwrap();
        settings.rate_limit_requests = requests;
        settings.rate_limit_window_seconds = window_seconds;
        RateGovernor::new(&settings)
    }

    #[test]
    fn denies_request_over_quota_with_positive_retry_after() {
        let governor = governor(5, 60);
        let client: IpAddr = "198.51.100.7".parse().unwrap();

        for _ in 0..5 {
            assert!(governor.admit(client).is_ok());
        }
        let retry_after = governor.admit(client).expect_err("sixth request denied");
        assert!(retry_after > Duration::ZERO);
    }

    #[test]
    fn clients_are_limited_independently() {
        let governor = governor(1, 60);
        let first: IpAddr = "198.51.100.7".parse().unwrap();
        let second: IpAddr = "198.51.100.8".parse().unwrap();

        assert!(governor.admit(first).is_ok());
        assert!(governor.admit(first).is_err());
        assert!(governor.admit(second).is_ok());
    }

    #[tokio::test]
    async fn readmits_after_window_elapses() {
        let governor = governor(2, 1);
        let client: IpAddr = "198.51.100.9".parse().unwrap();

        assert!(governor.admit(client).is_ok());
        assert!(governor.admit(client).is_ok());
        assert!(governor.admit(client).is_err());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(governor.admit(client).is_ok());
    }

    #[test]
    fn forwarded_header_used_only_when_trusted() {
        let mut settings = Settings::new_with_env_file(false).unwrap();
        settings.trust_x_forwarded_for = false;
        let untrusting = RateGovernor::new(&settings);
        settings.trust_x_forwarded_for = true;
        let trusting = RateGovernor::new(&settings);

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.1, 10.0.0.1".parse().unwrap());
        let peer: SocketAddr = "192.0.2.99:4000".parse().unwrap();

        assert_eq!(
            untrusting.identify(&headers, Some(peer)),
            "192.0.2.99".parse::<IpAddr>().unwrap()
        );
        assert_eq!(
            trusting.identify(&headers, Some(peer)),
            "203.0.113.1".parse::<IpAddr>().unwrap()
        );
    }
}
