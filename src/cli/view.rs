use crate::form::{FormController, FormMode};

const NAME_HEADER: &str = "FIELD";
const VALUE_HEADER: &str = "VALUE";

fn status(valid: bool, changed: bool, message: &str) -> String {
    if !valid {
        format!("invalid: {}", message)
    } else if changed {
        "changed".to_string()
    } else {
        String::new()
    }
}

/// Plain-text table of the form's fields. The focused field is marked `>`.
pub fn render_fields(form: &FormController) -> String {
    let name_width = form
        .fields()
        .map(|field| field.name().chars().count())
        .chain(std::iter::once(NAME_HEADER.len()))
        .max()
        .unwrap_or(0);
    let value_width = form
        .fields()
        .map(|field| field.value().chars().count())
        .chain(std::iter::once(VALUE_HEADER.len()))
        .max()
        .unwrap_or(0);

    let mode = match form.mode() {
        FormMode::Normal => "NORMAL",
        FormMode::Query => "QUERY",
    };
    let mut lines = vec![format!("{} [{}]", form.name(), mode)];
    lines.push(format!(
        "  {:<name_width$}  {:<value_width$}  STATUS",
        NAME_HEADER, VALUE_HEADER
    ));
    for field in form.fields() {
        let marker = if form.current_field() == Some(field.name()) {
            ">"
        } else {
            " "
        };
        let line = format!(
            "{} {:<name_width$}  {:<value_width$}  {}",
            marker,
            field.name(),
            field.value(),
            status(field.is_valid(), field.is_changed(), field.error_message())
        );
        lines.push(line.trim_end().to_string());
    }
    lines.join("\n")
}
