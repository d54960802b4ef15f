mod text_tests;
