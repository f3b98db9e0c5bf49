use colored::Colorize;
use env_logger::{Builder, Env};
use log::{info, Level};
use std::io::Write;
use std::future::{ready, Ready};
use actix_web::{
   dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
   Error,
};
use futures_util::future::LocalBoxFuture;

/// Logs every request line and the status it was answered with.
pub struct LoggerMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
   S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
   S::Future: 'static,
   B: 'static,
{
   type Response = ServiceResponse<B>;
   type Error = Error;
   type InitError = ();
   type Transform = LoggerMiddlewareService<S>;
   type Future = Ready<Result<Self::Transform, Self::InitError>>;

   fn new_transform(&self, service: S) -> Self::Future {
      ready(Ok(LoggerMiddlewareService { service }))
   }
}

pub struct LoggerMiddlewareService<S> {
   service: S
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
   type Response = ServiceResponse<B>;
   type Error = Error;
   type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

   forward_ready!(service);

   fn call(&self, req: ServiceRequest) -> Self::Future {
      let line = format!("{} {}", req.method(), req.uri());
      info!("request: {}", line);
      let fut = self.service.call(req);

      Box::pin(async move {
         let res = fut.await?;
         info!("response: {} -> {}", line, res.status());
         Ok(res)
      })
   }
}

/// `RUST_LOG` overrides the default `info` filter.
pub fn init_logger() {
   Builder::from_env(Env::default().default_filter_or("info"))
   .format(|buf, record| {
      let level = record.level().to_string();
      let level = match record.level() {
         Level::Error => level.red().bold(),
         Level::Warn => level.yellow().bold(),
         Level::Info => level.green().bold(),
         Level::Debug => level.blue().bold(),
         Level::Trace => level.magenta().bold(),
      };
      writeln!(
         buf,
         "{} {} [{}] {}",
         chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
         level,
         record.target(),
         record.args()
      )
   })
   .init()
}
