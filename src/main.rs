use env_logger;
use log::{error, info};

use sessionbridge::{common::Method, error::Error, Request, Response, SessionConfig, SessionStorage};

/// Set-Cookieヘッダー値からブラウザが送り返す `name=value` 部分を取り出す
fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap_or_default().to_string()
}

// 1回目のリクエスト: 訪問回数を記録し、フラッシュメッセージを残す
async fn first_visit(storage: &dyn SessionStorage, req: &Request) -> Result<Response, Error> {
    info!("{} {}", req.method, req.path);
    let mut session = storage.get_session_from_request(req).await?;
    let visits = session.get("visits").and_then(|v| v.as_i64()).unwrap_or(0) + 1;
    session.set("visits", visits);
    session.flash("notice", "Welcome back!");

    let set_cookie = storage.commit_session(&session, None).await?;
    Ok(Response::ok().with_set_cookie(set_cookie))
}

// 2回目のリクエスト: フラッシュメッセージを読んでからセッションを破棄する
async fn second_visit(storage: &dyn SessionStorage, req: &Request) -> Result<Response, Error> {
    info!("{} {}", req.method, req.path);
    let mut session = storage.get_session_from_request(req).await?;
    info!("visits = {:?}", session.get("visits"));
    info!("notice = {:?}", session.get("notice"));

    let set_cookie = storage.destroy_session(&session, None).await?;
    Ok(Response::new(303).with_set_cookie(set_cookie))
}

fn log_response(res: &Response) {
    info!("-> {}", res.status);
    for set_cookie in &res.cookies {
        info!("Set-Cookie: {}", set_cookie);
    }
}

async fn run() -> Result<(), Error> {
    let config = SessionConfig::from_env()?;
    let storage = config.build_storage()?;

    let first = first_visit(storage.as_ref(), &Request::new(Method::GET, "/")).await?;
    log_response(&first);

    let mut req = Request::new(Method::POST, "/logout");
    if let Some(set_cookie) = first.cookies.first() {
        req = req.with_header("Cookie", cookie_pair(set_cookie));
    }
    let second = second_visit(storage.as_ref(), &req).await?;
    log_response(&second);
    Ok(())
}

#[tokio::main]
async fn main() {
    // ロガーの初期化
    env_logger::init();

    info!("Starting SessionBridge demo");
    if let Err(e) = run().await {
        error!("Session demo failed: {} (status {})", e, e.status_code());
        std::process::exit(1);
    }
}
