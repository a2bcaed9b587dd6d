//! Static lookup tables keyed by model architecture: where to find a model's reference weights
//! and tokenizer, and how to wrap user input in the prompt format the model was tuned on.
use once_cell::sync::Lazy;
use std::borrow::Cow;
use std::collections::HashMap;

/// Placeholder in a prompt template that's replaced with the user's input
pub const INPUT_TEXT_PLACEHOLDER: &str = "{input_text}";

/// Default model repository for each architecture
pub static DEFAULT_HF_MODEL_DIRS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("BaichuanForCausalLM", "baichuan-inc/Baichuan-13B-Chat"),
        ("BloomForCausalLM", "bigscience/bloom-560m"),
        ("ChatGLMForCausalLM", "THUDM/chatglm3-6b"),
        ("FalconForCausalLM", "tiiuae/falcon-rw-1b"),
        ("GPTForCausalLM", "gpt2-medium"),
        ("GPTJForCausalLM", "EleutherAI/gpt-j-6b"),
        ("GPTNeoXForCausalLM", "EleutherAI/gpt-neox-20b"),
        ("InternLMForCausalLM", "internlm/internlm-chat-7b"),
        ("InternLM2ForCausalLM", "internlm/internlm2-chat-7b"),
        ("LlamaForCausalLM", "meta-llama/Llama-2-7b-hf"),
        ("MPTForCausalLM", "mosaicml/mpt-7b"),
        ("PhiForCausalLM", "microsoft/phi-2"),
        ("OPTForCausalLM", "facebook/opt-350m"),
        ("QWenForCausalLM", "Qwen/Qwen-7B"),
        ("RecurrentGemmaForCausalLM", "google/recurrentgemma-2b"),
    ])
});

const INTERNLM_META_INSTRUCTION: &str = "You are an AI assistant whose name is InternLM (书生·浦语).
- InternLM (书生·浦语) is a conversational language model that is developed by Shanghai AI Laboratory (上海人工智能实验室). It is designed to be helpful, honest, and harmless.
- InternLM (书生·浦语) can understand and communicate fluently in the language chosen by the user such as English and 中文.
";

/// Prompt template for each architecture that has one.  Every template contains
/// [`INPUT_TEXT_PLACEHOLDER`] exactly once.
pub static DEFAULT_PROMPT_TEMPLATES: Lazy<HashMap<&'static str, String>> = Lazy::new(|| {
    HashMap::from([
        (
            "InternLMForCausalLM",
            "<|User|>:{input_text}<eoh>\n<|Bot|>:".to_string(),
        ),
        (
            "InternLM2ForCausalLM",
            format!(
                "<|im_start|>system\n{INTERNLM_META_INSTRUCTION}<|im_end|>\n<|im_start|>user\n{INPUT_TEXT_PLACEHOLDER}<|im_end|>\n<|im_start|>assistant\n"
            ),
        ),
        (
            "QWenForCausalLM",
            "<|im_start|>system\nYou are a helpful assistant.<|im_end|>\n<|im_start|>user\n{input_text}<|im_end|>\n<|im_start|>assistant\n".to_string(),
        ),
    ])
});

pub fn default_model_dir(architecture: &str) -> Option<&'static str> {
    DEFAULT_HF_MODEL_DIRS.get(architecture).copied()
}

/// Wrap `input_text` in the architecture's prompt template.
///
/// Architectures without a template get the input back unchanged.
pub fn apply_prompt_template<'a>(architecture: &str, input_text: &'a str) -> Cow<'a, str> {
    match DEFAULT_PROMPT_TEMPLATES.get(architecture) {
        Some(template) => Cow::Owned(template.replace(INPUT_TEXT_PLACEHOLDER, input_text)),
        None => Cow::Borrowed(input_text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_have_one_placeholder() {
        for (architecture, template) in DEFAULT_PROMPT_TEMPLATES.iter() {
            assert_eq!(
                1,
                template.matches(INPUT_TEXT_PLACEHOLDER).count(),
                "{architecture}"
            );
        }
    }

    #[test]
    fn applies_template() {
        assert_eq!(
            "<|User|>:hi<eoh>\n<|Bot|>:",
            apply_prompt_template("InternLMForCausalLM", "hi")
        );

        let internlm2 = apply_prompt_template("InternLM2ForCausalLM", "hi");
        assert!(internlm2.starts_with("<|im_start|>system\nYou are an AI assistant"));
        assert!(internlm2.ends_with("<|im_start|>user\nhi<|im_end|>\n<|im_start|>assistant\n"));
    }

    #[test]
    fn no_template_is_passthrough() {
        assert!(matches!(
            apply_prompt_template("LlamaForCausalLM", "hi"),
            Cow::Borrowed("hi")
        ));
    }

    #[test]
    fn model_dirs() {
        assert_eq!(Some("gpt2-medium"), default_model_dir("GPTForCausalLM"));
        assert_eq!(None, default_model_dir("NotAModel"));
    }
}
