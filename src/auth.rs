use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use once_cell::sync::Lazy;
use tiny_http::{Header, Method, Response, Server};
use tracing::{debug, info, warn};
use url::Url;

use crate::data::AuthService;
use crate::tmdb;

static HTML_APPROVED: Lazy<String> = Lazy::new(|| page("Authorization Complete", "Moviepedia is now connected to your TMDB account. You can close this tab and return to the terminal."));

static HTML_DENIED: Lazy<String> = Lazy::new(|| page("Authorization Denied", "Moviepedia was not granted access. You can close this tab; watchlist and favorites stay unavailable until you sign in."));

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Moviepedia {title}</title>
    <style>
      :root {{
        color-scheme: dark light;
        --bg: #0d253f;
        --panel: #132f4f;
        --accent: #01b4e4;
        --text: #e8edf5;
        --muted: #a9b8c9;
        font-family: "Inter", "Segoe UI", -apple-system, BlinkMacSystemFont, "Helvetica Neue", sans-serif;
      }}
      body {{
        margin: 0;
        min-height: 100vh;
        display: flex;
        align-items: center;
        justify-content: center;
        background: var(--bg);
        color: var(--text);
      }}
      .card {{
        background: var(--panel);
        padding: 2.5rem 3rem;
        border-radius: 16px;
        max-width: 480px;
        text-align: center;
      }}
      h1 {{ margin: 0 0 1rem; font-size: 1.9rem; color: var(--accent); }}
      p {{ margin: 0; line-height: 1.5; color: var(--muted); }}
    </style>
  </head>
  <body>
    <main class="card">
      <h1>{title}</h1>
      <p>{body}</p>
    </main>
  </body>
</html>"#
    )
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("auth: authorization denied by user")]
    Denied,
    #[error("auth: authorization cancelled")]
    Cancelled,
    #[error("auth: authorization not completed within {}", format_timeout(.0))]
    TimedOut(Duration),
}

fn format_timeout(timeout: &Duration) -> String {
    humantime::format_duration(*timeout).to_string()
}

#[derive(Debug, Clone)]
pub struct Config {
    pub authenticate_url: String,
    pub redirect_uri: String,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            authenticate_url: tmdb::DEFAULT_AUTHENTICATE_URL.into(),
            redirect_uri: "http://127.0.0.1:0/moviepedia/approved".into(),
            poll_interval: Duration::from_millis(1000),
            timeout: Duration::from_secs(5 * 60),
        }
    }
}

/// Where the user approves the request token. Closing the surface is the
/// signal to attempt the session exchange.
pub trait AuthorizationSurface {
    /// Callback the provider should redirect to once the user answers.
    fn redirect_uri(&self) -> Option<String> {
        None
    }

    fn open(&mut self, url: &str) -> Result<()>;

    /// Returns `Ok(true)` once the surface is closed. Denial and
    /// cancellation surface as `AuthError`.
    fn is_closed(&mut self) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub request_token: String,
    pub browser_url: String,
}

pub struct Flow {
    cfg: Config,
    service: Arc<dyn AuthService>,
}

impl Flow {
    pub fn new(service: Arc<dyn AuthService>, cfg: Config) -> Self {
        Self { cfg, service }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn begin(&self, redirect_to: Option<&str>) -> Result<AuthorizationRequest> {
        let request_token = self.service.create_request_token()?;
        let browser_url = self.authorize_url(&request_token, redirect_to)?;
        debug!(url = %browser_url, "auth: request token issued");
        Ok(AuthorizationRequest {
            request_token,
            browser_url,
        })
    }

    fn authorize_url(&self, request_token: &str, redirect_to: Option<&str>) -> Result<String> {
        let mut base = self.cfg.authenticate_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let mut url = Url::parse(&base)
            .and_then(|base| base.join(request_token))
            .context("auth: build authorization url")?;
        if let Some(redirect) = redirect_to {
            url.query_pairs_mut().append_pair("redirect_to", redirect);
        }
        Ok(url.to_string())
    }

    pub fn wait_for_close(&self, surface: &mut dyn AuthorizationSurface) -> Result<()> {
        let deadline = Instant::now() + self.cfg.timeout;
        loop {
            if surface.is_closed()? {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(AuthError::TimedOut(self.cfg.timeout).into());
            }
            thread::sleep(self.cfg.poll_interval.min(deadline - now));
        }
    }

    pub fn complete(&self, authz: &AuthorizationRequest) -> Result<String> {
        let session_id = self.service.create_session(&authz.request_token)?;
        info!("auth: session established");
        Ok(session_id)
    }

    /// Runs the whole exchange: token, surface, poll until closed, session.
    pub fn authenticate(&self, surface: &mut dyn AuthorizationSurface) -> Result<String> {
        let redirect = surface.redirect_uri();
        let authz = self.begin(redirect.as_deref())?;
        surface.open(&authz.browser_url)?;
        self.wait_for_close(surface)?;
        self.complete(&authz)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Redirect {
    Approved,
    Denied,
}

/// Lets another thread close or cancel a pending browser surface.
#[derive(Debug, Clone, Default)]
pub struct SurfaceHandle {
    confirmed: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
}

impl SurfaceHandle {
    pub fn confirm(&self) {
        self.confirmed.store(true, Ordering::SeqCst);
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

type OpenHook = Box<dyn FnMut(&str) + Send>;

/// System browser plus a loopback listener for the provider's redirect.
pub struct BrowserSurface {
    redirect_uri: String,
    rx: Receiver<Redirect>,
    shutdown: Sender<()>,
    handle: SurfaceHandle,
    launch_browser: bool,
    on_open: Option<OpenHook>,
}

impl BrowserSurface {
    pub fn bind(redirect_uri: &str) -> Result<Self> {
        let redirect = Url::parse(redirect_uri).context("auth: parse redirect uri")?;
        let host = redirect.host_str().unwrap_or("127.0.0.1");
        let port = redirect.port().unwrap_or(0);
        let path = if redirect.path().is_empty() {
            "/".to_string()
        } else {
            redirect.path().to_string()
        };

        let listen_addr = format!("{}:{}", host, port);
        let server = Server::http(&listen_addr).map_err(|err| anyhow!("auth: listen: {}", err))?;
        let actual = format!("http://{}{}", server.server_addr(), path);

        let (result_tx, result_rx) = bounded::<Redirect>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);

        thread::spawn(move || loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }
            let request = match server.recv_timeout(Duration::from_millis(200)) {
                Ok(Some(request)) => request,
                Ok(None) => continue,
                Err(err) => {
                    warn!(error = %err, "auth: redirect listener failed");
                    break;
                }
            };
            if handle_redirect(request, &result_tx) {
                break;
            }
        });

        Ok(Self {
            redirect_uri: actual,
            rx: result_rx,
            shutdown: shutdown_tx,
            handle: SurfaceHandle::default(),
            launch_browser: true,
            on_open: None,
        })
    }

    pub fn handle(&self) -> SurfaceHandle {
        self.handle.clone()
    }

    /// Called with the authorization URL once it is known, before the
    /// browser is launched.
    pub fn on_open(mut self, hook: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_open = Some(Box::new(hook));
        self
    }

    pub fn without_browser(mut self) -> Self {
        self.launch_browser = false;
        self
    }
}

impl Drop for BrowserSurface {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
    }
}

impl AuthorizationSurface for BrowserSurface {
    fn redirect_uri(&self) -> Option<String> {
        Some(self.redirect_uri.clone())
    }

    fn open(&mut self, url: &str) -> Result<()> {
        if let Some(hook) = self.on_open.as_mut() {
            hook(url);
        }
        if self.launch_browser {
            if let Err(err) = webbrowser::open(url) {
                warn!(error = %err, "auth: could not launch browser");
            }
        }
        Ok(())
    }

    fn is_closed(&mut self) -> Result<bool> {
        if self.handle.cancelled.load(Ordering::SeqCst) {
            return Err(AuthError::Cancelled.into());
        }
        match self.rx.try_recv() {
            Ok(Redirect::Approved) => Ok(true),
            Ok(Redirect::Denied) => Err(AuthError::Denied.into()),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                Ok(self.handle.confirmed.load(Ordering::SeqCst))
            }
        }
    }
}

/// Returns true once the redirect carried an answer.
fn handle_redirect(req: tiny_http::Request, tx: &Sender<Redirect>) -> bool {
    if req.method() != &Method::Get {
        let _ = req.respond(Response::from_string("method not allowed").with_status_code(405));
        return false;
    }

    let params: HashMap<String, String> = match Url::parse(&format!("http://loopback{}", req.url()))
    {
        Ok(url) => url.query_pairs().into_owned().collect(),
        Err(_) => HashMap::new(),
    };
    let flag = |name: &str| params.get(name).map(String::as_str) == Some("true");

    let (outcome, html) = if flag("denied") {
        (Redirect::Denied, HTML_DENIED.as_str())
    } else if flag("approved") {
        (Redirect::Approved, HTML_APPROVED.as_str())
    } else {
        let _ = req.respond(Response::from_string("not found").with_status_code(404));
        return false;
    };

    tx.send(outcome).ok();
    let mut response = Response::from_string(html);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..]) {
        response = response.with_header(header);
    }
    let _ = req.respond(response);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeAuth, FakeSurface};

    fn fast_config() -> Config {
        Config {
            poll_interval: Duration::from_millis(1),
            timeout: Duration::from_millis(200),
            ..Config::default()
        }
    }

    #[test]
    fn builds_authorization_url_with_redirect() {
        let auth = Arc::new(FakeAuth::new("tok123", Ok("sess".into())));
        let flow = Flow::new(auth, Config::default());
        let authz = flow.begin(Some("http://127.0.0.1:5000/cb")).unwrap();
        assert_eq!(authz.request_token, "tok123");
        assert_eq!(
            authz.browser_url,
            "https://www.themoviedb.org/authenticate/tok123?redirect_to=http%3A%2F%2F127.0.0.1%3A5000%2Fcb"
        );
    }

    #[test]
    fn exchanges_token_after_surface_closes() {
        let auth = Arc::new(FakeAuth::new("tok", Ok("abc123".into())));
        let flow = Flow::new(auth.clone(), fast_config());
        let mut surface = FakeSurface::closing_after(3);

        let session = flow.authenticate(&mut surface).unwrap();
        assert_eq!(session, "abc123");
        assert_eq!(surface.opened.as_deref(), Some("https://www.themoviedb.org/authenticate/tok"));
        assert!(surface.polls >= 3);
        assert_eq!(auth.exchanged(), vec!["tok".to_string()]);
    }

    #[test]
    fn times_out_when_surface_never_closes() {
        let auth = Arc::new(FakeAuth::new("tok", Ok("abc".into())));
        let flow = Flow::new(auth.clone(), fast_config());
        let mut surface = FakeSurface::never_closing();

        let err = flow.authenticate(&mut surface).unwrap_err();
        assert!(matches!(err.downcast_ref::<AuthError>(), Some(AuthError::TimedOut(_))));
        assert!(auth.exchanged().is_empty());
    }

    #[test]
    fn browser_surface_reports_approval() {
        let mut surface = BrowserSurface::bind("http://127.0.0.1:0/moviepedia/approved")
            .unwrap()
            .without_browser();
        let redirect = surface.redirect_uri().unwrap();
        assert!(!surface.is_closed().unwrap());

        let resp = reqwest::blocking::get(format!("{redirect}?request_token=tok&approved=true"))
            .unwrap();
        assert!(resp.status().is_success());
        assert!(surface.is_closed().unwrap());
    }

    #[test]
    fn browser_surface_reports_denial() {
        let mut surface = BrowserSurface::bind("http://127.0.0.1:0/cb")
            .unwrap()
            .without_browser();
        let redirect = surface.redirect_uri().unwrap();
        reqwest::blocking::get(format!("{redirect}?request_token=tok&denied=true")).unwrap();

        let err = surface.is_closed().unwrap_err();
        assert!(matches!(err.downcast_ref::<AuthError>(), Some(AuthError::Denied)));
    }

    #[test]
    fn handle_confirms_and_cancels() {
        let mut surface = BrowserSurface::bind("http://127.0.0.1:0/cb")
            .unwrap()
            .without_browser();
        let handle = surface.handle();
        handle.confirm();
        assert!(surface.is_closed().unwrap());
        handle.cancel();
        assert!(surface.is_closed().is_err());
    }
}
