//! A small seed corpus of prompt-engineering strategy texts, partitioned
//! by target provider. Standing in for a real pre-built indexer, which is
//! out of scope — see DESIGN.md.

pub struct StrategyDoc {
    pub provider: &'static str,
    pub domain: &'static str,
    pub text: &'static str,
}

pub const DEFAULT_PARTITION: &str = "default";

pub const CORPUS: &[StrategyDoc] = &[
    StrategyDoc {
        provider: "anthropic",
        domain: "coding",
        text: "When prompting Claude for coding tasks, provide the full file context, state the language and framework explicitly, and ask for a plan before code. Use XML-like tags to separate instructions from reference material.",
    },
    StrategyDoc {
        provider: "anthropic",
        domain: "general",
        text: "Claude responds well to clear role framing and explicit constraints stated up front. Break multi-step tasks into numbered instructions and ask for step-by-step reasoning before a final answer.",
    },
    StrategyDoc {
        provider: "openai",
        domain: "creative",
        text: "GPT models produce stronger creative writing when given a concrete persona, tone, and audience. Provide one or two examples of the desired style before the actual request.",
    },
    StrategyDoc {
        provider: "openai",
        domain: "general",
        text: "For GPT models, front-load the system message with the exact output format required and use few-shot examples for anything structured, such as JSON or tables.",
    },
    StrategyDoc {
        provider: "google",
        domain: "factual",
        text: "Gemini performs best on factual and retrieval-style queries when the prompt explicitly asks it to cite which part of the provided context supports each claim.",
    },
    StrategyDoc {
        provider: "google",
        domain: "general",
        text: "Gemini models benefit from explicit multi-turn context summarization; restate prior constraints in the final user turn rather than relying on long-range recall.",
    },
    StrategyDoc {
        provider: "groq",
        domain: "general",
        text: "Groq-hosted open models are sensitive to prompt length; keep instructions terse, avoid redundant restatement, and prefer a single clear directive over layered caveats.",
    },
    StrategyDoc {
        provider: DEFAULT_PARTITION,
        domain: "general",
        text: "State the desired output format, audience, and any hard constraints (length, language, structure) as the first lines of the prompt. Prefer concrete examples over abstract description.",
    },
];
