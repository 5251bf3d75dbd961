use minijinja::Environment;
use tracing::error;

pub fn init_templates() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();

    // Register built-in templates
    env.add_template("index.html", include_str!("../../templates/index.html"))?;
    env.add_template("error.html", include_str!("../../templates/error.html"))?;

    Ok(env)
}

pub fn render_template(env: &Environment, template_name: &str, context: minijinja::value::Value) -> String {
    match env.get_template(template_name) {
        Ok(tmpl) => match tmpl.render(context) {
            Ok(result) => result,
            Err(e) => {
                error!("Template render error: {}", e);
                format!("<h1>Template Error</h1><p>{}</p>", e)
            }
        },
        Err(e) => {
            error!("Template not found: {} ({})", template_name, e);
            format!("<h1>Template Not Found</h1><p>{}: {}</p>", template_name, e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    #[test]
    fn index_lists_suggestions() {
        let env = init_templates().unwrap();
        let html = render_template(
            &env,
            "index.html",
            context! { suggestions => vec!["Show the count of legal prompts by category"], version => "0.1.0" },
        );
        assert!(html.contains("Show the count of legal prompts by category"));
        assert!(html.contains("/static/app.js"));
    }

    #[test]
    fn missing_template_renders_message() {
        let env = init_templates().unwrap();
        let html = render_template(&env, "nope.html", context! {});
        assert!(html.contains("Template Not Found"));
    }
}
