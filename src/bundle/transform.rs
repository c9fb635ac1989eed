//! Per-function source transforms.
//!
//! Sources written against the legacy `module.exports` convention are
//! wrapped so they load as native ES modules: a CommonJS `require` shim is
//! injected, the export target is aliased, and it is re-exported as the
//! module's default handler. Everything else passes through untouched.

/// Marker of the legacy module-export convention.
pub const LEGACY_EXPORT_MARKER: &str = "module.exports";

/// Returns true if `code` uses the legacy module-export convention.
#[must_use]
pub fn is_legacy_module(code: &str) -> bool {
    code.contains(LEGACY_EXPORT_MARKER)
}

/// Produces the deployable module for one function.
#[must_use]
pub fn transform_source(slug: &str, code: &str) -> String {
    if is_legacy_module(code) {
        wrap_legacy(slug, code)
    } else {
        format!("// Function: {slug} (native module)\n{code}\n")
    }
}

fn wrap_legacy(slug: &str, code: &str) -> String {
    let mut out = String::with_capacity(code.len() + 512);

    out.push_str(&format!("// Function: {slug} (wrapped {LEGACY_EXPORT_MARKER} module)\n"));
    out.push_str("import { createRequire } from \"node:module\";\n");
    out.push_str("const require = createRequire(import.meta.url);\n");
    out.push_str("const module: { exports: any } = { exports: {} };\n");
    out.push_str("let exports = module.exports;\n\n");
    out.push_str(code);
    if !code.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("\nconst __legacyHandler = module.exports;\n");
    out.push_str("export default __legacyHandler;\n");

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_source_passes_through_with_provenance() {
        let code = "export default (req: Request) => new Response(\"hi\");";
        let out = transform_source("hello", code);

        assert!(out.starts_with("// Function: hello (native module)\n"));
        assert!(out.contains(code));
        assert!(!out.contains("createRequire"));
    }

    #[test]
    fn test_legacy_source_is_wrapped() {
        let code = "module.exports = async function (req) {\n  return new Response(\"ok\");\n};";
        let out = transform_source("legacy-fn", code);

        assert!(out.contains("import { createRequire } from \"node:module\";"));
        assert!(out.contains(code));
        assert!(out.contains("const __legacyHandler = module.exports;"));
        assert!(out.trim_end().ends_with("export default __legacyHandler;"));

        // Shim precedes the user code, re-export follows it.
        let shim = out.find("createRequire").unwrap_or(usize::MAX);
        let body = out.find("async function").unwrap_or(0);
        let export = out.find("export default").unwrap_or(0);
        assert!(shim < body && body < export);
    }
}
