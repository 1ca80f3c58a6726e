use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpResponse,
};
use futures_util::future::LocalBoxFuture;
use governor::{clock::DefaultClock, state::keyed::DashMapStateStore, Quota, RateLimiter};
use std::future::{ready, Ready};
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, warn};

type IpLimiter = RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>;

/// Per-IP limiter wrapped around the credential endpoints. Clones share
/// one limiter, so a value built at startup enforces its quota
/// process-wide no matter how many workers wrap it.
#[derive(Clone)]
pub struct RateLimitMiddleware {
    limiter: Arc<IpLimiter>,
}

impl RateLimitMiddleware {
    pub fn per_minute(requests: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(requests).expect("quota must be non-zero"));
        RateLimitMiddleware {
            limiter: Arc::new(RateLimiter::dashmap(quota)),
        }
    }
}

/// Client address, honoring Forwarded/X-Forwarded-For when behind a proxy.
/// Transports without a usable peer address yield None.
fn client_ip(req: &ServiceRequest) -> Option<IpAddr> {
    req.connection_info()
        .realip_remote_addr()
        .and_then(|addr| addr.split(':').next())
        .and_then(|ip| ip.parse::<IpAddr>().ok())
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service,
            limiter: self.limiter.clone(),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: S,
    limiter: Arc<IpLimiter>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match client_ip(&req) {
            Some(ip) => {
                if self.limiter.check_key(&ip).is_err() {
                    warn!(ip = %ip, path = %req.path(), "Rate limit exceeded");
                    let (req, _pl) = req.into_parts();
                    let res = HttpResponse::TooManyRequests().json(serde_json::json!({
                        "success": false,
                        "message": "Too many requests. Please try again later."
                    }));
                    return Box::pin(async move {
                        Ok(ServiceResponse::new(req, res).map_into_boxed_body())
                    });
                }
            }
            None => {
                // Unix-socket and in-process test transports carry no
                // address to key on; those requests pass unlimited.
                debug!(path = %req.path(), "No client address, request not rate limited");
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn resolves_forwarded_ip() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "203.0.113.7"))
            .to_srv_request();
        assert_eq!(client_ip(&req), Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn resolves_peer_ip_without_the_port() {
        let req = TestRequest::default()
            .peer_addr("198.51.100.4:44312".parse().unwrap())
            .to_srv_request();
        assert_eq!(client_ip(&req), Some("198.51.100.4".parse().unwrap()));
    }

    #[test]
    fn missing_address_yields_none() {
        let req = TestRequest::default().to_srv_request();
        assert_eq!(client_ip(&req), None);
    }

    #[test]
    fn limiter_trips_once_the_quota_is_spent() {
        let middleware = RateLimitMiddleware::per_minute(2);
        let ip: IpAddr = "192.0.2.1".parse().unwrap();
        assert!(middleware.limiter.check_key(&ip).is_ok());
        assert!(middleware.limiter.check_key(&ip).is_ok());
        assert!(middleware.limiter.check_key(&ip).is_err());
    }
}
