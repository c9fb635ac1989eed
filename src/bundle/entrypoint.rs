//! Generated router entrypoint.

use super::router::{RouteTable, HEALTH_SEGMENT, ROUTER_TYPE};

/// Static dispatch logic appended after the generated route map.
const ROUTER_BODY: &str = r#"
const slugs = Object.keys(routes);

type Handler = (req: Request) => Response | Promise<Response>;

function resolveHandler(mod: unknown): Handler | undefined {
  if (typeof mod === "function") return mod as Handler;
  if (mod && typeof (mod as { fetch?: unknown }).fetch === "function") {
    const target = mod as { fetch: Handler };
    return (req) => target.fetch(req);
  }
  return undefined;
}

function json(body: unknown, status = 200): Response {
  return new Response(JSON.stringify(body), {
    status,
    headers: { "content-type": "application/json" },
  });
}

async function handle(req: Request): Promise<Response> {
  const started = Date.now();
  const url = new URL(req.url);
  const segments = url.pathname.split("/").filter((s) => s.length > 0);
  let status = 500;

  try {
    if (segments.length === 0 || (segments.length === 1 && segments[0] === HEALTH_SEGMENT)) {
      status = 200;
      return json({
        status: "ok",
        type: ROUTER_TYPE,
        functions: slugs,
        timestamp: new Date().toISOString(),
      });
    }

    const slug = segments[0];
    const handler = Object.hasOwn(routes, slug) ? resolveHandler(routes[slug]) : undefined;
    if (!handler) {
      status = 404;
      return json({ error: "Function not found", function: slug, available: slugs }, 404);
    }

    const target = new URL(req.url);
    target.pathname = "/" + segments.slice(1).join("/");
    const response = await handler(new Request(target.toString(), req));
    status = response.status;
    return response;
  } catch (err) {
    status = 500;
    const message = err instanceof Error ? err.message : String(err);
    console.error(`[router] ${req.method} ${url.pathname} failed: ${message}`);
    return json({ error: "Internal server error", function: segments[0] ?? null }, 500);
  } finally {
    console.log(`[router] ${req.method} ${url.pathname} ${status} ${Date.now() - started}ms`);
  }
}
"#;

/// Runtime the router module is started under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterRuntime {
    /// Long-running server started with `Deno.serve`.
    Deno,
    /// Vercel edge function exporting the handler.
    VercelEdge,
}

impl RouterRuntime {
    const fn start(self) -> &'static str {
        match self {
            Self::Deno => "\nDeno.serve(handle);\n",
            Self::VercelEdge => {
                "\nexport const config = { runtime: \"edge\" };\n\nexport default handle;\n"
            }
        }
    }
}

/// Renders the entrypoint module for `table`.
///
/// `import_dir` is the directory the per-function modules are imported
/// from, relative to the entrypoint.
#[must_use]
pub fn render_entrypoint(table: &RouteTable, import_dir: &str, runtime: RouterRuntime) -> String {
    let mut out = String::new();

    out.push_str("// Generated function router. Do not edit.\n");
    for entry in table.entries() {
        out.push_str(&format!(
            "import {} from \"{import_dir}/{}.ts\";\n",
            entry.ident, entry.slug
        ));
    }
    out.push('\n');

    out.push_str(&format!("const HEALTH_SEGMENT = \"{HEALTH_SEGMENT}\";\n"));
    out.push_str(&format!("const ROUTER_TYPE = \"{ROUTER_TYPE}\";\n\n"));

    out.push_str("const routes: Record<string, unknown> = {\n");
    for entry in table.entries() {
        out.push_str(&format!("  \"{}\": {},\n", entry.slug, entry.ident));
    }
    out.push_str("};\n");

    out.push_str(ROUTER_BODY);
    out.push_str(runtime.start());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imports_and_route_map() {
        let table = RouteTable::new(["hello", "my-func"]);
        let src = render_entrypoint(&table, "./functions", RouterRuntime::Deno);

        assert!(src.contains("import fn_hello from \"./functions/hello.ts\";"));
        assert!(src.contains("import fn_my_func from \"./functions/my-func.ts\";"));
        assert!(src.contains("\"hello\": fn_hello,"));
        assert!(src.contains("\"my-func\": fn_my_func,"));
        assert!(src.contains("Deno.serve("));
    }

    #[test]
    fn test_empty_table_renders_health_only_router() {
        let table = RouteTable::new(Vec::<String>::new());
        let src = render_entrypoint(&table, "./functions", RouterRuntime::Deno);

        assert!(!src.contains("import fn_"));
        assert!(src.contains("const routes: Record<string, unknown> = {\n};"));
        assert!(src.contains("Deno.serve("));
    }

    #[test]
    fn test_router_does_not_leak_stack_traces() {
        let src = render_entrypoint(&RouteTable::new(["a"]), "./functions", RouterRuntime::VercelEdge);

        assert!(!src.contains(".stack"));
        assert!(src.contains("export default handle;"));
        assert!(src.contains("\"Internal server error\""));
    }
}
