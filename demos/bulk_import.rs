use deqm_http::{resource::Parameter, DeqmClient, PollOutcome, Resource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let export_url = std::env::var("DEQM_EXPORT_URL")?;
    let client = DeqmClient::from_env().map_err(anyhow::Error::msg)?;

    let parameters = Resource::Parameters(deqm_http::resource::Parameters::new(vec![
        Parameter::new("exportUrl").with_value("Url", export_url),
    ]));

    let location = client.bulk_import(&parameters).await?;
    println!("import accepted, polling {location}");

    match client.poll(&location).await? {
        PollOutcome::Completed {
            response, attempts, ..
        } => {
            println!("finished with {} after {attempts} request(s)", response.status);
            if let Ok(Resource::OperationOutcome(outcome)) = response.resource() {
                for issue in outcome.issue {
                    println!("{}: {}", issue.severity, issue.diagnostics.unwrap_or_default());
                }
            }
        }
        PollOutcome::TimedOut { last, elapsed, .. } => {
            eprintln!("still {} after {elapsed:?}", last.status);
        }
    }

    Ok(())
}
