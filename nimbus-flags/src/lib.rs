// Engine reflection flag constants.
//
// Shared by nimbus-core (ClassDB, Object), nimbus-bridge (marshalling),
// and nimbus-codegen (binding generation). Kept in a dependency-free crate
// so the generator never has to link the runtime just for the bit values.

// ---------------------------------------------------------------------------
// Property usage (PROPERTY_USAGE_*) — u32
// ---------------------------------------------------------------------------

pub const PROPERTY_USAGE_NONE: u32 = 0;
/// Property is serialized with the owning resource/scene.
pub const PROPERTY_USAGE_STORAGE: u32 = 1 << 0;
/// Property is shown and editable in the inspector.
pub const PROPERTY_USAGE_EDITOR: u32 = 1 << 1;
/// Entry is a category marker, not a real property.
pub const PROPERTY_USAGE_CATEGORY: u32 = 1 << 2;
/// String value is run through the translation tables before display.
pub const PROPERTY_USAGE_INTERNATIONALIZED: u32 = 1 << 3;
/// Declared type is Nil; the stored value may be any Variant kind.
pub const PROPERTY_USAGE_NIL_IS_VARIANT: u32 = 1 << 4;
/// Internal bookkeeping property; hidden from every tool surface.
pub const PROPERTY_USAGE_INTERNAL: u32 = 1 << 5;
/// Property was declared by an attached script, not by the class.
pub const PROPERTY_USAGE_SCRIPT_VARIABLE: u32 = 1 << 6;

/// Stored and editable.
pub const PROPERTY_USAGE_DEFAULT: u32 = PROPERTY_USAGE_STORAGE | PROPERTY_USAGE_EDITOR;
/// Stored but hidden from the inspector.
pub const PROPERTY_USAGE_NO_EDITOR: u32 = PROPERTY_USAGE_STORAGE;

// ---------------------------------------------------------------------------
// Property hints (PROPERTY_HINT_*) — u32
// ---------------------------------------------------------------------------

pub const PROPERTY_HINT_NONE: u32 = 0;
/// hint_string is "min,max[,step]".
pub const PROPERTY_HINT_RANGE: u32 = 1;
/// hint_string is a comma-separated value list.
pub const PROPERTY_HINT_ENUM: u32 = 2;
/// hint_string is a file filter, e.g. "*.png".
pub const PROPERTY_HINT_FILE: u32 = 3;
/// hint_string is the expected resource class name.
pub const PROPERTY_HINT_RESOURCE_TYPE: u32 = 4;
pub const PROPERTY_HINT_MULTILINE_TEXT: u32 = 5;

// ---------------------------------------------------------------------------
// Method flags (METHOD_FLAG_*) — u32
// ---------------------------------------------------------------------------

pub const METHOD_FLAG_NORMAL: u32 = 1 << 0;
/// Method exists only in editor builds.
pub const METHOD_FLAG_EDITOR: u32 = 1 << 1;
/// Method does not mutate the receiver.
pub const METHOD_FLAG_CONST: u32 = 1 << 2;
/// Contract-only signature a script may implement; no native body.
pub const METHOD_FLAG_VIRTUAL: u32 = 1 << 3;
/// Trailing arguments are collected into a Variant slice.
pub const METHOD_FLAG_VARARG: u32 = 1 << 4;
pub const METHOD_FLAGS_DEFAULT: u32 = METHOD_FLAG_NORMAL;

// ---------------------------------------------------------------------------
// Connection flags (CONNECT_*) — u32
// ---------------------------------------------------------------------------

/// Dispatch through the message queue instead of inline.
pub const CONNECT_QUEUED: u32 = 1 << 0;
/// Connection is saved with the scene; exempt from oneshot teardown while
/// being edited.
pub const CONNECT_PERSIST: u32 = 1 << 1;
/// Disconnect after the first delivery.
pub const CONNECT_ONESHOT: u32 = 1 << 2;
/// Repeated connects stack a counter; only the last disconnect removes it.
pub const CONNECT_REFERENCE_COUNTED: u32 = 1 << 3;

// ---------------------------------------------------------------------------
// Object notifications — i32
// ---------------------------------------------------------------------------

/// Sent right after construction, once the entity id is live.
pub const NOTIFICATION_POSTINITIALIZE: i32 = 0;
/// Sent right before destruction, while the object is still resolvable.
pub const NOTIFICATION_PREDELETE: i32 = 1;
/// First id available to engine consumers outside the kernel.
pub const NOTIFICATION_USER_BASE: i32 = 1000;

// ---------------------------------------------------------------------------
// Resource saver flags (SAVER_FLAG_*) — u32
// ---------------------------------------------------------------------------

pub const SAVER_FLAG_NONE: u32 = 0;
/// Store relative paths where possible.
pub const SAVER_FLAG_RELATIVE_PATHS: u32 = 1 << 0;
/// Bundle sub-resources into the same file.
pub const SAVER_FLAG_BUNDLE_RESOURCES: u32 = 1 << 1;
/// Update the resource's recorded path after a successful save.
pub const SAVER_FLAG_CHANGE_PATH: u32 = 1 << 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_flags_are_distinct_bits() {
        let all = [
            CONNECT_QUEUED,
            CONNECT_PERSIST,
            CONNECT_ONESHOT,
            CONNECT_REFERENCE_COUNTED,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_eq!(a & b, 0);
            }
        }
    }

    #[test]
    fn default_usage_is_storage_and_editor() {
        assert_eq!(
            PROPERTY_USAGE_DEFAULT,
            PROPERTY_USAGE_STORAGE | PROPERTY_USAGE_EDITOR
        );
        assert_eq!(PROPERTY_USAGE_NO_EDITOR & PROPERTY_USAGE_EDITOR, 0);
    }
}
