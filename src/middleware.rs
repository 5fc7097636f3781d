use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::StatusCode;
use actix_web::Error;
use log::{debug, log, Level};
use std::future::{ready, Future, Ready};
use std::pin::Pin;
use std::rc::Rc;
use std::time::Instant;

use crate::auth::{ADMIN_COOKIE, USER_COOKIE};
use crate::uploads::UPLOADS_URL_PREFIX;

/// Part of the shop a request is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Area {
    Assets,
    Admin,
    Account,
    Storefront,
}

impl Area {
    fn of(path: &str) -> Self {
        if path.starts_with(UPLOADS_URL_PREFIX) || path == "/health" {
            Area::Assets
        } else if path.starts_with("/products/admin")
            || path.starts_with("/admin/")
            || matches!(path, "/auth/login" | "/auth/logout" | "/auth/setup")
        {
            Area::Admin
        } else if path.starts_with("/auth/") {
            Area::Account
        } else {
            Area::Storefront
        }
    }

    fn label(self) -> &'static str {
        match self {
            Area::Assets => "assets",
            Area::Admin => "admin",
            Area::Account => "account",
            Area::Storefront => "shop",
        }
    }

    fn quiet_level(self) -> Level {
        match self {
            Area::Assets => Level::Debug,
            _ => Level::Info,
        }
    }
}

fn credential_label(req: &ServiceRequest) -> &'static str {
    match (req.cookie(ADMIN_COOKIE).is_some(), req.cookie(USER_COOKIE).is_some()) {
        (true, true) => "admin+user",
        (true, false) => "admin",
        (false, true) => "user",
        (false, false) => "anonymous",
    }
}

/// Log level and ANSI colour for a finished response. Failures keep their
/// level whatever the area.
fn outcome_level(status: StatusCode, area: Area) -> (Level, &'static str) {
    if status.is_server_error() {
        (Level::Error, "1;31")
    } else if status.is_client_error() {
        (Level::Warn, "1;33")
    } else {
        (area.quiet_level(), "1;32")
    }
}

/// Logs one line when a request arrives and one when its response leaves,
/// tagged with the shop area. Session tokens are never logged, only which
/// credential cookies came with the request.
pub struct RequestLogger;

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RequestLoggerMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggerMiddleware { service: Rc::new(service) }))
    }
}

pub struct RequestLoggerMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequestLoggerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + 'static>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let area = Area::of(req.path());
        let line = format!("{} {}", req.method(), req.path());
        let client_ip = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_owned();

        log!(
            area.quiet_level(),
            "→ [{}] \x1B[1;34m{}\x1B[0m from {} as {}",
            area.label(),
            line,
            client_ip,
            credential_label(&req)
        );

        let service = self.service.clone();
        Box::pin(async move {
            let started = Instant::now();
            let res = service.call(req).await?;
            let status = res.status();
            let (level, colour) = outcome_level(status, area);

            log!(
                level,
                "← [{}] \x1B[{}m{}\x1B[0m for {} in {:.2?}",
                area.label(),
                colour,
                status,
                line,
                started.elapsed()
            );
            if status.is_redirection() {
                debug!("{} redirected", line);
            }
            Ok(res)
        })
    }
}
