//! Login flow against a scripted application, no browser needed.
//!
//! Run with: `cargo run --example mock_login -p flowprobe`

use flowprobe::flows::routes;
use flowprobe::mock::{MockApp, MockDriver, MockElement, MockPage, Reaction};
use flowprobe::{Flow, FlowRunner, HarnessConfig, LoginFlow, ProbeResult, Session};

fn app() -> MockApp {
    let login = MockPage::new(routes::LOGIN)
        .element(
            MockElement::new("input")
                .attr("type", "email")
                .attr("placeholder", "Email"),
        )
        .element(
            MockElement::new("input")
                .attr("type", "password")
                .attr("placeholder", "Password"),
        )
        .element(
            MockElement::new("button")
                .attr("type", "submit")
                .on_click(Reaction::after(
                    250,
                    Reaction::alert(
                        "Logged in successfully",
                        vec![Reaction::navigate(routes::FEED)],
                    ),
                )),
        );
    MockApp::new()
        .redirect("/", routes::LOGIN)
        .page(login)
        .page(MockPage::new(routes::FEED).element(MockElement::new("h1").text("Feed")))
}

#[tokio::main]
async fn main() -> ProbeResult<()> {
    println!("=== Flowprobe: mock login ===\n");

    let config = HarnessConfig::default().with_output_dir(std::env::temp_dir().join("flowprobe-demo"));
    config.validate()?;

    let driver = MockDriver::new(app());
    let session = Session::from_config(driver.clone(), &config)?;
    let flows: Vec<Box<dyn Flow>> = vec![Box::new(LoginFlow::from_config(&config))];

    let suite = FlowRunner::from_config(&config).run(session, &flows).await?;
    for result in &suite.results {
        println!(
            "{:<8} {:<6} state={} url={}",
            result.flow,
            if result.passed { "PASS" } else { "FAIL" },
            result.state,
            result.last_url.as_deref().unwrap_or("-"),
        );
        for step in &result.steps {
            println!("    {:>5}ms  {}", step.elapsed_ms, step.name);
        }
    }
    println!("\nnavigations: {:?}", driver.navigations());
    println!("dialogs resolved: {}", driver.resolved_dialogs().len());
    Ok(())
}
