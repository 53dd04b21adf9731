use std::sync::Arc;

use mcqgen_core::chunker::Chunker;
use mcqgen_core::config::ChunkingConfig;
use mcqgen_core::text::clean_text;
use mcqgen_core::traits::{SpanTokenizer, WhitespaceTokenizer};

const DOC: &str = "Photosynthesis is the process by which green plants convert light into \
chemical energy. It takes place mainly in the leaves! Chlorophyll absorbs red and blue light \
while reflecting green. The light reactions split water and release oxygen as a by-product. \
The Calvin cycle then fixes carbon dioxide into sugars using ATP and NADPH. Why are plants \
green? Because chlorophyll reflects green wavelengths. Stomata regulate gas exchange. Guard \
cells open and close the stomata in response to water availability.";

fn chunker(max_tokens: usize, overlap_sentences: usize) -> Chunker {
    let config = ChunkingConfig { max_tokens, overlap_sentences };
    Chunker::new(Arc::new(WhitespaceTokenizer), config).expect("chunker")
}

#[test]
fn every_chunk_respects_the_token_budget() {
    for max in [5usize, 12, 20, 40] {
        for overlap in 0..3 {
            let chunks = chunker(max, overlap).chunk(DOC).expect("chunk");
            assert!(!chunks.is_empty());
            for c in &chunks {
                assert!(c.token_length <= max, "max={max} overlap={overlap} chunk={:?}", c.text);
                let counted = WhitespaceTokenizer.count_tokens(&c.text).expect("count");
                assert_eq!(counted, c.token_length);
            }
        }
    }
}

#[test]
fn forced_slices_are_full_except_the_last() {
    let long_sentence = (0..23).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ") + ".";
    let chunks = chunker(5, 1).chunk(&long_sentence).expect("chunk");
    let lens: Vec<usize> = chunks.iter().map(|c| c.token_length).collect();
    assert_eq!(lens, vec![5, 5, 5, 5, 3]);
}

#[test]
fn rechunking_without_overlap_reproduces_boundaries() {
    let first = chunker(20, 0).chunk(DOC).expect("chunk");
    let rejoined = first.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join(" ");
    let second = chunker(20, 0).chunk(&rejoined).expect("chunk");
    assert_eq!(first, second);
}

#[test]
fn overlap_chunks_share_a_sentence_with_their_predecessor() {
    let chunks = chunker(30, 1).chunk(DOC).expect("chunk");
    assert!(chunks.len() > 1);
    for pair in chunks.windows(2) {
        let next_first_sentence =
            pair[1].text.split_inclusive(['.', '!', '?']).next().expect("sentence").trim();
        assert!(
            pair[0].text.contains(next_first_sentence),
            "{:?} / {:?}",
            pair[0].text,
            pair[1].text
        );
    }
}

#[test]
fn cleaned_ocr_text_chunks_like_plain_text() {
    let ocr = "Photosyn-\nthesis is the process\nby which green plants convert light \
               into chemical energy.";
    let chunks = chunker(40, 1).chunk(&clean_text(ocr)).expect("chunk");
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].text.starts_with("Photosynthesis is the process by which"));
}
