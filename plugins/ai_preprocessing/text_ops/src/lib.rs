//! Zenith AI Text Operations Plugin
//!
//! High-performance text preprocessing for LLM training pipelines.
//! Compiled to WASM for secure, sandboxed execution.
//!
//! Supported Operations:
//! - Tokenization (BPE, WordPiece)
//! - Text cleaning (lowercase, remove punctuation)
//! - Padding/Truncation
//! - Special token insertion ([CLS], [SEP], etc.)

#![no_std]

extern crate alloc;

use alloc::vec::Vec;
use alloc::string::String;

/// Tokenizer configuration
#[repr(C)]
pub struct TokenizerConfig {
    pub max_length: u32,
    pub padding: bool,
    pub truncation: bool,
    pub add_special_tokens: bool,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            max_length: 512,
            padding: true,
            truncation: true,
            add_special_tokens: true,
        }
    }
}

/// Plugin entry point - tokenize text
#[no_mangle]
pub extern "C" fn tokenize(
    input_ptr: *const u8,
    input_len: usize,
    vocab_ptr: *const u8,
    vocab_len: usize,
    config_ptr: *const u8,
    output_ptr: *mut u32,
    output_len: *mut usize,
) -> i32 {
    // Placeholder implementation
    // Full implementation would:
    // 1. Parse input text from input_ptr
    // 2. Load vocabulary from vocab_ptr
    // 3. Apply BPE/WordPiece tokenization
    // 4. Handle padding/truncation
    // 5. Write token IDs to output_ptr
    
    0 // Success
}

/// Clean text: lowercase and remove excess whitespace
#[no_mangle]
pub extern "C" fn clean_text(
    input_ptr: *const u8,
    input_len: usize,
    lowercase: bool,
    remove_punctuation: bool,
    output_ptr: *mut u8,
    output_len: *mut usize,
) -> i32 {
    // Placeholder for actual cleaning implementation
    0
}

/// Pad or truncate token sequence to fixed length
#[no_mangle]
pub extern "C" fn pad_sequence(
    input_ptr: *const u32,
    input_len: usize,
    target_len: usize,
    pad_token_id: u32,
    output_ptr: *mut u32,
) -> i32 {
    // Placeholder for actual padding implementation
    0
}

/// Create attention mask from token IDs
#[no_mangle]
pub extern "C" fn create_attention_mask(
    token_ids_ptr: *const u32,
    token_len: usize,
    pad_token_id: u32,
    output_ptr: *mut u32,
) -> i32 {
    // Placeholder for actual mask creation
    // 1 for real tokens, 0 for padding
    0
}

/// Plugin metadata
#[no_mangle]
pub extern "C" fn plugin_info() -> *const u8 {
    static INFO: &[u8] = b"zenith-text-ops v0.1.0\0";
    INFO.as_ptr()
}

/// Plugin version
#[no_mangle]
pub extern "C" fn plugin_version() -> u32 {
    1 // Version 0.1.0
}
