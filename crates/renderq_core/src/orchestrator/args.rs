//! aerender command-line construction.

use crate::jobs::Job;

/// Build renderer arguments for `job`.
///
/// Order: `-project`, `-comp`, `-output`, `-RStemplate`, `-OMtemplate`,
/// each only when set. The "All Comps" sentinel omits `-comp`.
pub fn build_render_args(job: &Job) -> Vec<String> {
    let options = &job.options;
    let mut args = vec![
        "-project".to_string(),
        job.project.path.to_string_lossy().to_string(),
    ];

    if let Some(comp) = options.single_composition() {
        args.push("-comp".to_string());
        args.push(comp.to_string());
    }

    if let Some(output) = &options.output {
        args.push("-output".to_string());
        args.push(output.to_string_lossy().to_string());
    }

    if let Some(template) = options.render_settings.as_deref().filter(|t| !t.is_empty()) {
        args.push("-RStemplate".to_string());
        args.push(template.to_string());
    }

    if let Some(template) = options.output_module.as_deref().filter(|t| !t.is_empty()) {
        args.push("-OMtemplate".to_string());
        args.push(template.to_string());
    }

    args
}

/// Quote arguments for the job log's command line.
pub fn format_command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(|a| {
            if a.is_empty() || a.contains(char::is_whitespace) {
                format!("\"{}\"", a)
            } else {
                a.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
