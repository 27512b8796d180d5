use maud::{PreEscaped, DOCTYPE};

use super::*;

const STYLE: &str = r#"
body { font-family: sans-serif; max-width: 48rem; margin: 0 auto; padding: 1rem; }
nav.crumbs a + a::before { content: " / "; }
ul.entries { list-style: none; padding: 0; }
ul.entries li { padding: .25rem 0; }
.count { color: #888; font-size: .85em; margin-left: .5em; }
.comment { border-top: 1px solid #ddd; padding: .5rem 0; }
.comment .meta { color: #666; font-size: .85em; }
textarea { width: 100%; min-height: 4rem; }
"#;

pub(super) fn universal(
    title: &str,
    user: Option<&Identity>,
    login_redirect: &str,
    body: Markup,
) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en-us" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { "Consus | " (title) }
                style { (PreEscaped(STYLE)) }
            }
            body {
                header {
                    a href="/files/" { "Consus" }
                    " · "
                    @match user {
                        Some(user) => {
                            span { (user.as_str()) }
                            " "
                            a href="/logout" { "Log out" }
                        }
                        None => {
                            a href={ "/login?redirect=" (encode_path(login_redirect)) } { "Log in" }
                        }
                    }
                }
                main { (body) }
                footer { small { "v" (env!("CARGO_PKG_VERSION")) } }
            }
        }
    }
}
