use universal_build::boundary::BuildWarning;

#[test]
fn test_unparsable_tag_display() {
    let warning = BuildWarning::UnparsableTag {
        tag: "release-123".to_string(),
    };

    let display_msg = warning.to_string();
    assert!(
        display_msg.contains("release-123"),
        "Message should contain tag 'release-123', got: {}",
        display_msg
    );
}

#[test]
fn test_remote_tags_skipped_mentions_token() {
    let display_msg = BuildWarning::RemoteTagsSkipped.to_string();
    assert!(
        display_msg.contains("GITHUB_TOKEN"),
        "Message should name the token variable, got: {}",
        display_msg
    );
}

#[test]
fn test_ignored_argument_display() {
    let warning = BuildWarning::IgnoredArgument {
        token: "--unknown".to_string(),
    };
    assert_eq!(
        warning.to_string(),
        "Ignoring unrecognized argument '--unknown'"
    );
}

#[test]
fn test_component_skipped_display() {
    let warning = BuildWarning::ComponentSkipped {
        path: "docs/api".to_string(),
        skip_path: "docs".to_string(),
    };

    let display_msg = warning.to_string();
    assert!(display_msg.contains("docs/api"), "got: {}", display_msg);
    assert!(display_msg.contains("skip path 'docs'"), "got: {}", display_msg);
}

#[test]
fn test_warnings_compare_by_value() {
    assert_eq!(
        BuildWarning::UnparsableTag {
            tag: "x".to_string()
        },
        BuildWarning::UnparsableTag {
            tag: "x".to_string()
        }
    );
    assert_ne!(
        BuildWarning::RemoteTagsSkipped,
        BuildWarning::UnparsableTag {
            tag: "x".to_string()
        }
    );
}
