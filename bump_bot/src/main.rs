use bot_commons::*;

fn main() {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "WARN,bump_bot=info,bot_commons=info");
    }
    start_everything(bump_bot::entry());
}
