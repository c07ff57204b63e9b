//! `{placeholder}` substitution for operator-supplied command templates.

/// Replaces every `{name}` in `template` with its value from `vars`.
///
/// Unknown placeholders are left untouched.
#[must_use]
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{name}}}"), value)
    })
}

/// Renders each argument of a command template.
#[must_use]
pub fn render_args(args: &[String], vars: &[(&str, &str)]) -> Vec<String> {
    args.iter().map(|arg| render(arg, vars)).collect()
}
