use sr_domain::config::{Config, ConfigError, ConfigSeverity};

/// Validate the config and print the report.  Returns `false` when at
/// least one issue is an error; warnings alone pass.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();
    print!("{}", render_report(&issues, config_path));
    !issues.iter().any(|i| i.severity == ConfigSeverity::Error)
}

/// Errors first, then warnings, then a one-line verdict.
fn render_report(issues: &[ConfigError], config_path: &str) -> String {
    if issues.is_empty() {
        return format!("{config_path}: ok\n");
    }

    let (errors, warnings): (Vec<&ConfigError>, Vec<&ConfigError>) = issues
        .iter()
        .partition(|i| i.severity == ConfigSeverity::Error);

    let mut out = String::new();
    for issue in errors.iter().chain(warnings.iter()) {
        out.push_str(&format!("  {issue}\n"));
    }
    let verdict = if errors.is_empty() { "usable" } else { "rejected" };
    out.push_str(&format!(
        "{config_path}: {verdict} ({} error(s), {} warning(s))\n",
        errors.len(),
        warnings.len()
    ));
    out
}

/// Dump the resolved config (with all defaults filled in) as TOML.
pub fn show(config: &Config) -> anyhow::Result<()> {
    let output = toml::to_string_pretty(config)
        .map_err(|e| anyhow::anyhow!("serializing config: {e}"))?;
    print!("{output}");
    Ok(())
}
