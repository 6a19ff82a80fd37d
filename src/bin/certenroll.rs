extern crate certenroll;

use certenroll::cli::options::Options;
use certenroll::service::CallContext;

#[tokio::main]
async fn main() {
    let options = Options::from_args();
    let format = options.general.format;

    let ctx = CallContext::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel();
        }
    });

    let report = options.run(&ctx).await.and_then(|report| {
        let rendered = report.render()?;
        Ok((report, rendered))
    });
    match report {
        Ok((report, rendered)) => {
            print!("{}", rendered);
            if report.is_failure() {
                ::std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{}", e.render(format));
            ::std::process::exit(1);
        }
    }
}
