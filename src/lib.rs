pub mod auth;
pub mod config;
pub mod core;
pub mod engagement;
pub mod feed;
pub mod follow;
pub mod media;
pub mod models;
pub mod posts;
pub mod stories;
pub mod users;

use spin_sdk::http::{Request, Response};
#[cfg(target_arch = "wasm32")]
use spin_sdk::http::IntoResponse;
#[cfg(target_arch = "wasm32")]
use spin_sdk::http_component;

/// Dispatches one request to its handler. Shared by the Spin component,
/// the native adapter binary, and the in-process test suite.
pub fn route(req: Request) -> anyhow::Result<Response> {
    let path = req.path().to_string();
    let method = req.method().to_string();

    match (method.as_str(), path.as_str()) {
        ("POST", "/signup") => users::handle_signup(req),
        ("POST", "/signin") => auth::signin(req),
        ("POST", "/logout") => auth::logout(req),
        ("GET", "/profile") => users::handle_get_profile(req),
        ("PUT", "/profile") => users::handle_update_profile(req),
        ("DELETE", "/profile/picture") => users::handle_remove_picture(req),
        ("GET", "/profile/posts") => users::handle_profile_posts(req),
        ("POST", "/post") => posts::handle_create(req),
        ("GET", "/posts") => posts::handle_global_feed(req),
        ("GET", "/feed") => posts::handle_following_feed(req),
        ("POST", p) if p.starts_with("/posts/") && p.ends_with("/like") => {
            engagement::handle_like(req)
        }
        ("GET", p) if p.starts_with("/posts/") && p.ends_with("/likes") => {
            engagement::handle_likers(req)
        }
        ("POST", p) if p.starts_with("/posts/") && p.ends_with("/comments") => {
            engagement::handle_comment(req)
        }
        ("PUT", p) if p.starts_with("/posts/") => posts::handle_edit(req),
        ("DELETE", p) if p.starts_with("/posts/") => posts::handle_delete(req),
        ("GET", p) if p.starts_with("/follow/status/") => follow::handle_follow_status(req),
        ("POST", p) if p.starts_with("/follow/") => follow::handle_follow(req),
        ("GET", "/users/suggestions") => follow::handle_suggestions(req),
        ("GET", "/users/followers") => follow::handle_followers(req),
        ("GET", "/users/following") => follow::handle_following(req),
        ("GET", p) if p.starts_with("/users/") => users::handle_get_user(req),
        ("POST", "/story") => stories::handle_create(req),
        ("GET", "/stories") => stories::handle_list(req),
        ("GET", "/stories/me") => stories::handle_mine(req),
        ("DELETE", p) if p.starts_with("/stories/") => stories::handle_delete(req),
        ("POST", "/media") => media::handle_upload(req),
        ("GET", p) if p.starts_with("/media/") => media::handle_serve(req),
        ("GET", p) => core::static_server::serve_static(p),
        _ => Ok(Response::builder().status(404).body("Not found").build()),
    }
}

// === Component entrypoint ===
#[cfg(target_arch = "wasm32")]
#[http_component]
fn handle(req: Request) -> anyhow::Result<impl IntoResponse> {
    route(req)
}
