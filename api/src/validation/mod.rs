use kube::core::Rule;

pub fn git_source_required() -> Rule {
    Rule::new(include_str!("./git_source_required.cel"))
        .message("git parameters are required when type is git")
        .field_path(".spec.git")
}

pub fn mountpoint_relative() -> Rule {
    Rule::new(include_str!("./mountpoint_relative.cel"))
        .message("mountpoint is relative to the container root")
        .field_path(".spec.mountpoint")
}
